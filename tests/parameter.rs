//! Parameter tests: typed storage, conversions, references and shared containers.
mod common;
use common::*;
use serde_json::json;
use shikumi::prelude::*;
use shikumi::value::convert;

fn reference_reader(name: &str, reference: ParameterReference) -> BehaviourSpec {
    BehaviourSpec::new("Reader").with_config(json!({
        "name": name,
        "parameter": serde_json::to_value(reference).unwrap(),
    }))
}

#[test]
fn test_add_and_convert_on_write() {
    let mut container = ParameterContainer::new();
    container.add("speed", ValueType::Float, Value::Float(1.5)).unwrap();

    assert_eq!(container.get_value("speed"), Some(Value::Float(1.5)));
    container.set_value("speed", 3i64).unwrap();
    assert_eq!(container.get_value("speed"), Some(Value::Float(3.0)));
    assert_eq!(container.len(), 1);
}

#[test]
fn test_duplicate_name_rejected() {
    let mut container = ParameterContainer::new();
    container.add("hp", ValueType::Int, Value::Int(10)).unwrap();

    let result = container.add("hp", ValueType::Float, Value::Float(1.0));

    assert_eq!(result, Err(ParameterError::DuplicateName("hp".to_string())));
}

#[test]
fn test_null_rejected_for_value_types_only() {
    let mut container = ParameterContainer::new();
    container.add("hp", ValueType::Int, Value::Int(10)).unwrap();
    container
        .add("target", ValueType::Object("Actor".to_string()), Value::Null)
        .unwrap();

    let result = container.set_value("hp", Value::Null);
    assert!(matches!(result, Err(ParameterError::NullAssignment { .. })));
    assert_eq!(container.get_value("hp"), Some(Value::Int(10)));

    assert!(container.set_value("target", Value::Null).is_ok());
}

#[test]
fn test_failed_write_leaves_value_untouched() {
    let mut container = ParameterContainer::new();
    container.add("hp", ValueType::Int, Value::Int(10)).unwrap();

    let result = container.set_value("hp", "lots");

    assert!(matches!(result, Err(ParameterError::TypeMismatch { .. })));
    assert_eq!(container.get_value("hp"), Some(Value::Int(10)));
}

#[test]
fn test_type_change_is_reported_to_typed_references() {
    let mut container = ParameterContainer::new();
    let id = container.add("speed", ValueType::Float, Value::Float(2.0)).unwrap();
    let declared = ValueType::Float;
    assert_eq!(
        container.read(Some(id), "speed", Some(&declared)),
        Ok(Value::Float(2.0))
    );

    assert!(container.change_type(id, ValueType::Int));

    assert!(matches!(
        container.read(Some(id), "speed", Some(&declared)),
        Err(ParameterError::TypeChanged { .. })
    ));
    assert!(matches!(
        container.write(Some(id), "speed", Some(&declared), Value::Float(1.0)),
        Err(ParameterError::TypeChanged { .. })
    ));
    // Untyped access still works, against the new type.
    assert_eq!(container.read(Some(id), "speed", None), Ok(Value::Int(0)));
}

#[test]
fn test_lookup_by_id_falls_back_to_name() {
    let mut original = ParameterContainer::new();
    original.add("a", ValueType::Int, Value::Int(1)).unwrap();
    let b_id = original.add("b", ValueType::Int, Value::Int(2)).unwrap();

    // A re-imported container whose ids were not preserved.
    let mut imported = ParameterContainer::new();
    imported.add("b", ValueType::Int, Value::Int(20)).unwrap();
    assert_eq!(imported.read(Some(b_id), "b", None), Ok(Value::Int(20)));

    // Renaming keeps id lookups working.
    original.rename(b_id, "renamed").unwrap();
    assert_eq!(original.read(Some(b_id), "b", None), Ok(Value::Int(2)));
    assert!(original.by_name("b").is_none());
}

#[test]
fn test_value_conversions() {
    assert_eq!(convert(&Value::Float(2.6), &ValueType::Int), Some(Value::Int(3)));
    assert_eq!(convert(&Value::Bool(true), &ValueType::Int), Some(Value::Int(1)));
    assert_eq!(
        convert(&Value::Int(2), &ValueType::Enum("Mood".to_string())),
        Some(Value::Enum {
            type_name: "Mood".to_string(),
            index: 2
        })
    );
    assert_eq!(convert(&Value::Float(f64::NAN), &ValueType::Int), None);
    assert_eq!(convert(&Value::Float(1e300), &ValueType::Int), None);
    assert_eq!(convert(&Value::Float(-1e19), &ValueType::Int), None);
    assert_eq!(
        convert(&Value::Float(1e300), &ValueType::Enum("Mood".to_string())),
        None
    );
    assert_eq!(i64::from_value(&Value::Float(-4.4)), Some(-4));
    assert_eq!(i32::from_value(&Value::Int(5_000_000_000)), None);
    assert_eq!(i32::from_value(&Value::Int(i64::from(i32::MIN))), Some(i32::MIN));
    assert_eq!(i32::from_value(&Value::Float(1e10)), None);
    assert_eq!(convert(&Value::String("x".to_string()), &ValueType::Float), None);
    assert!(ValueType::Float.is_assignable_from(&ValueType::Int));
    assert!(!ValueType::Int.is_assignable_from(&ValueType::Float));
}

#[test]
fn test_write_is_visible_to_later_reads_in_same_pass() {
    let log = new_log();
    let mut graph = NodeGraph::new("same_pass");
    graph
        .parameters_mut()
        .add("count", ValueType::Int, Value::Int(0))
        .unwrap();
    add_state(
        &mut graph,
        "S",
        vec![
            reference_reader("before", ParameterReference::local("count")),
            BehaviourSpec::new("Counter").with_config(json!({ "parameter": "count" })),
            reference_reader("after", ParameterReference::local("count")),
        ],
    );
    let (mut scheduler, _) = spawn(&log, graph);

    scheduler.advance(0.1);

    assert_eq!(take(&log), vec!["before:0", "after:1"]);
}

#[test]
fn test_instance_parameters_are_copies_of_the_graph() {
    let log = new_log();
    let mut graph = NodeGraph::new("copies");
    graph
        .parameters_mut()
        .add("count", ValueType::Int, Value::Int(0))
        .unwrap();
    add_state(
        &mut graph,
        "S",
        vec![BehaviourSpec::new("Counter").with_config(json!({ "parameter": "count" }))],
    );
    let (mut scheduler, id) = spawn(&log, graph);

    scheduler.advance(0.1);
    scheduler.advance(0.1);

    let instance = scheduler.instance_mut(id).unwrap();
    assert_eq!(instance.parameters().get_value("count"), Some(Value::Int(2)));
    assert_eq!(instance.graph().parameters().get_value("count"), Some(Value::Int(0)));
    instance.reset_parameters();
    assert_eq!(instance.parameters().get_value("count"), Some(Value::Int(0)));
}

#[test]
fn test_shared_container_is_visible_to_every_instance() {
    let log = new_log();
    let mut world = ParameterContainer::new();
    world
        .add("time_of_day", ValueType::Float, Value::Float(12.0))
        .unwrap();

    let mut graph = NodeGraph::new("shared");
    add_state(
        &mut graph,
        "S",
        vec![reference_reader("r", ParameterReference::shared("world", "time_of_day"))],
    );
    let mut scheduler = Scheduler::builder()
        .with_registry(registry(&log))
        .with_shared_parameters("world", world)
        .with_asset("shared", graph)
        .build();
    scheduler.spawn("shared").unwrap();
    scheduler.spawn("shared").unwrap();

    scheduler.advance(0.1);
    assert_eq!(take(&log), vec!["r:12.0", "r:12.0"]);

    scheduler
        .runtime_mut()
        .shared_parameters_mut("world")
        .unwrap()
        .set_value("time_of_day", 18.5)
        .unwrap();
    scheduler.advance(0.1);
    assert_eq!(take(&log), vec!["r:18.5", "r:18.5"]);
}

#[test]
fn test_missing_shared_container_reads_nothing() {
    let log = new_log();
    let mut graph = NodeGraph::new("no_container");
    add_state(
        &mut graph,
        "S",
        vec![reference_reader("r", ParameterReference::shared("nowhere", "x"))],
    );
    let (mut scheduler, _) = spawn(&log, graph);

    scheduler.advance(0.1);

    assert_eq!(take(&log), vec!["r:null"]);
}

#[test]
fn test_parameter_handle_passed_through_a_slot() {
    let log = new_log();
    let mut graph = NodeGraph::new("handle_slot");
    graph
        .parameters_mut()
        .add("speed", ValueType::Float, Value::Float(4.5))
        .unwrap();
    add_state(
        &mut graph,
        "S",
        vec![
            reference_reader("r", ParameterReference::Slot("target".to_string()))
                .with_input_constant(
                    "target",
                    ValueType::Parameter,
                    Value::Parameter(ParameterHandle::local("speed")),
                ),
        ],
    );
    let (mut scheduler, _) = spawn(&log, graph);

    scheduler.advance(0.1);

    assert_eq!(take(&log), vec!["r:4.5"]);
}

#[test]
fn test_flexible_field_reads_parameter() {
    let log = new_log();
    let (mut graph, root) = tree_graph("flexible");
    graph
        .parameters_mut()
        .add("delay", ValueType::Float, Value::Float(0.5))
        .unwrap();
    let wait = BehaviourSpec::new("Wait").with_config(json!({
        "seconds": serde_json::to_value(FlexibleField::<f64>::parameter("delay")).unwrap(),
    }));
    add_child(&mut graph, root, "Wait", NodeKind::Action, Some(wait));
    let (mut scheduler, id) = spawn(&log, graph);

    scheduler.advance(0.5);
    assert!(scheduler.instance(id).unwrap().is_playing());

    scheduler.advance(0.5);
    let instance = instance(&scheduler, id);
    assert_eq!(instance.tree().unwrap().last_status(), Some(Status::Success));
}

#[test]
fn test_flexible_field_defaults_to_constant() {
    let field: FlexibleField<f64> = serde_json::from_value(json!({ "constant": 2.5 })).unwrap();
    assert_eq!(field, FlexibleField::Constant(2.5));
    assert_eq!(FlexibleField::<f64>::default(), FlexibleField::Constant(0.0));
    assert_eq!(FlexibleField::from(1.0), FlexibleField::Constant(1.0));
}

#[test]
fn test_loaded_container_keeps_parameter_ids_unique() {
    let mut container = ParameterContainer::new();
    let speed = container.add("speed", ValueType::Float, Value::Float(1.0)).unwrap();
    let mut data = serde_json::to_value(&container).unwrap();
    data.as_object_mut().unwrap().remove("ids");

    let mut loaded: ParameterContainer = serde_json::from_value(data).unwrap();
    let jump = loaded.add("jump", ValueType::Bool, Value::Bool(false)).unwrap();

    assert_ne!(jump, speed);
    assert_eq!(loaded.get(speed).unwrap().name(), "speed");
    assert_eq!(loaded.get(jump).unwrap().name(), "jump");
}

#[test]
fn test_container_with_repeated_parameter_id_is_rejected() {
    let mut container = ParameterContainer::new();
    container.add("speed", ValueType::Float, Value::Float(1.0)).unwrap();
    let mut data = serde_json::to_value(&container).unwrap();
    let parameters = data["parameters"].as_array_mut().unwrap();
    let mut copy = parameters[0].clone();
    copy["name"] = json!("speed_copy");
    parameters.push(copy);

    let result = serde_json::from_value::<ParameterContainer>(data);

    assert!(result.unwrap_err().to_string().contains("duplicate parameter id"));
}
