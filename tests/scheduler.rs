//! Scheduler tests: spawning, play control across instances, registry aliases,
//! the clock and trace formatting.
mod common;
use common::*;
use serde_json::json;
use shikumi::prelude::*;

#[test]
fn test_spawn_unknown_asset_fails() {
    let log = new_log();
    let mut scheduler = scheduler(&log, vec![]);

    let result = scheduler.spawn("missing");

    assert_eq!(result, Err(InstanceError::AssetNotFound("missing".to_string())));
    assert_eq!(scheduler.instances().count(), 0);
}

#[test]
fn test_spawn_with_unregistered_behaviour_type_fails() {
    let log = new_log();
    let mut graph = NodeGraph::new("unknown_type");
    add_state(&mut graph, "S", vec![BehaviourSpec::new("Nope")]);
    let mut scheduler = scheduler(&log, vec![("unknown_type", graph)]);

    let result = scheduler.spawn("unknown_type");

    assert_eq!(
        result,
        Err(InstanceError::Behaviour(BehaviourError::UnknownType(
            "Nope".to_string()
        )))
    );
}

#[test]
fn test_type_alias_maps_to_builtin() {
    let log = new_log();
    let (mut graph, idle, running) = idle_running_graph();
    let mut alias = trigger_transition("Go", "Start");
    alias.type_name = "DoorSwitch".to_string();
    graph.add_behaviour(idle, alias).unwrap();

    let mut scheduler = Scheduler::builder()
        .with_registry(registry(&log))
        .with_type_alias("DoorSwitch", "TriggerTransition")
        .with_type_alias("Ignored", "NotABuiltin")
        .with_asset("door", graph)
        .build();
    let id = scheduler.spawn("door").unwrap();

    scheduler.send_trigger(id, "Go").unwrap();

    assert_eq!(instance(&scheduler, id).current_state(), Some(running));
    assert!(scheduler.runtime().registry().type_names().contains(&"DoorSwitch"));
    assert!(!scheduler.runtime().registry().type_names().contains(&"Ignored"));
}

#[test]
fn test_play_on_start_can_be_disabled() {
    let log = new_log();
    let (mut graph, idle, _) = idle_running_graph();
    graph.settings_mut().play_on_start = false;
    let (mut scheduler, id) = spawn(&log, graph);

    assert_eq!(instance(&scheduler, id).play_state(), PlayState::Stopped);
    assert!(!contains(&log, "idle:begin"));
    scheduler.advance(0.1);
    assert!(take(&log).is_empty());

    scheduler.play(id).unwrap();
    assert_eq!(instance(&scheduler, id).current_state(), Some(idle));
    assert_eq!(take(&log), vec!["idle:awake", "running:awake", "idle:begin"]);
}

#[test]
fn test_instances_run_independently() {
    let log = new_log();
    let (graph, idle, running) = idle_running_graph();
    let mut scheduler = scheduler(&log, vec![("door", graph)]);
    let first = scheduler.spawn("door").unwrap();
    let second = scheduler.spawn("door").unwrap();
    assert_ne!(first, second);

    scheduler.send_trigger(first, "Start").unwrap();

    assert_eq!(instance(&scheduler, first).current_state(), Some(running));
    assert_eq!(instance(&scheduler, second).current_state(), Some(idle));
}

#[test]
fn test_broadcast_trigger_reaches_every_instance() {
    let log = new_log();
    let (graph, _, running) = idle_running_graph();
    let mut scheduler = scheduler(&log, vec![("door", graph)]);
    for _ in 0..3 {
        scheduler.spawn("door").unwrap();
    }

    scheduler.broadcast_trigger("Start");

    assert!(scheduler
        .instances()
        .all(|instance| instance.current_state() == Some(running)));
    assert_eq!(count(&log, "running:begin"), 3);
}

#[test]
fn test_broadcast_skips_manual_instances() {
    let log = new_log();
    let (graph, idle, running) = idle_running_graph();
    let mut scheduler = scheduler(&log, vec![("door", graph)]);
    let autonomous = scheduler.spawn("door").unwrap();
    let manual = scheduler.spawn("door").unwrap();
    scheduler
        .instance_mut(manual)
        .unwrap()
        .set_update_mode(UpdateMode::Manual);

    scheduler.broadcast_trigger("Start");

    assert_eq!(instance(&scheduler, autonomous).current_state(), Some(running));
    assert_eq!(instance(&scheduler, manual).current_state(), Some(idle));

    scheduler.send_trigger(manual, "Start").unwrap();
    assert_eq!(instance(&scheduler, manual).current_state(), Some(running));
}

#[test]
fn test_despawn_removes_instance() {
    let log = new_log();
    let (graph, _, _) = idle_running_graph();
    let mut scheduler = scheduler(&log, vec![("door", graph)]);
    let first = scheduler.spawn("door").unwrap();
    let second = scheduler.spawn("door").unwrap();

    assert!(scheduler.despawn(first));
    assert!(!scheduler.despawn(first));

    let remaining: Vec<_> = scheduler.instances().map(GraphInstance::id).collect();
    assert_eq!(remaining, vec![second]);
    assert_eq!(scheduler.pause(first), Err(InstanceError::InstanceNotFound(first.raw())));
}

#[test]
fn test_manual_instances_are_skipped_by_scheduler() {
    let log = new_log();
    let (graph, _, _) = idle_running_graph();
    let (mut scheduler, id) = spawn(&log, graph);
    take(&log);

    scheduler
        .instance_mut(id)
        .unwrap()
        .set_update_mode(UpdateMode::Manual);
    scheduler.advance(0.1);
    assert!(take(&log).is_empty());
    assert_eq!(instance(&scheduler, id).frame(), 0);

    scheduler
        .instance_mut(id)
        .unwrap()
        .set_update_mode(UpdateMode::Autonomous);
    scheduler.advance(0.1);
    assert_eq!(take(&log), vec!["idle:update", "idle:late"]);
    assert_eq!(instance(&scheduler, id).frame(), 1);
}

#[test]
fn test_spawn_graph_without_registering_it() {
    let log = new_log();
    let (graph, idle, _) = idle_running_graph();
    let mut scheduler = scheduler(&log, vec![]);

    let id = scheduler.spawn_graph(graph).unwrap();

    let instance = instance(&scheduler, id);
    assert_eq!(instance.asset(), None);
    assert_eq!(instance.current_state(), Some(idle));
}

#[test]
fn test_clock_applies_time_scale() {
    let mut scheduler = Scheduler::builder().with_time_scale(2.0).build();

    scheduler.advance(0.5);
    scheduler.execute_fixed_update(0.25);

    let clock = scheduler.runtime().clock();
    assert_eq!(clock.time(TimeBase::Scaled), 1.0);
    assert_eq!(clock.time(TimeBase::Unscaled), 0.5);
    assert_eq!(clock.time(TimeBase::Fixed), 0.5);
    assert_eq!(clock.delta(TimeBase::Scaled), 1.0);
    assert_eq!(clock.delta(TimeBase::Unscaled), 0.5);
}

#[test]
fn test_clock_clamps_negative_input() {
    let mut clock = Clock::new();
    clock.set_time_scale(-1.0);
    assert_eq!(clock.time_scale(), 0.0);

    clock.set_time_scale(1.0);
    clock.advance(-3.0);
    assert_eq!(clock.time(TimeBase::Scaled), 0.0);
}

#[test]
fn test_time_scale_speeds_up_waits() {
    let log = new_log();
    let (mut graph, root) = tree_graph("fast");
    add_child(
        &mut graph,
        root,
        "Wait",
        NodeKind::Action,
        Some(BehaviourSpec::new("Wait").with_config(json!({ "seconds": { "constant": 1.0 } }))),
    );
    let mut scheduler = Scheduler::builder()
        .with_registry(registry(&log))
        .with_time_scale(2.0)
        .with_asset("fast", graph)
        .build();
    let id = scheduler.spawn("fast").unwrap();

    scheduler.advance(0.5);
    assert!(instance(&scheduler, id).is_playing());
    scheduler.advance(0.5);

    assert_eq!(instance(&scheduler, id).play_state(), PlayState::Stopped);
    assert_eq!(
        instance(&scheduler, id).tree().unwrap().last_status(),
        Some(Status::Success)
    );
}

#[test]
fn test_trace_formats_state_machine() {
    let log = new_log();
    let (graph, _, _) = idle_running_graph();
    let (mut scheduler, id) = spawn(&log, graph);

    assert_eq!(
        TraceFormatter::format_instance(instance(&scheduler, id)),
        "idle_running #1 [playing] state: Idle"
    );

    scheduler.send_trigger(id, "Start").unwrap();
    scheduler.execute_update(0.1);
    assert_eq!(
        TraceFormatter::format_instance(instance(&scheduler, id)),
        "idle_running #1 [playing] state: Running | pending: Stop"
    );

    scheduler.stop(id).unwrap();
    assert_eq!(
        TraceFormatter::format_instance(instance(&scheduler, id)),
        "idle_running #1 [stopped] state: -"
    );
}

#[test]
fn test_trace_formats_residents_and_tree_path() {
    let log = new_log();
    let (mut graph, root) = tree_graph("patrol");
    add_resident(&mut graph, "Senses", vec![probe("senses")]);
    let walk = add_state(&mut graph, "Walk", vec![probe("walk")]);
    graph.set_start_state(walk).unwrap();
    let sequence = add_child(
        &mut graph,
        root,
        "Seq",
        NodeKind::Composite,
        Some(BehaviourSpec::new("Sequencer")),
    );
    add_child(&mut graph, sequence, "", NodeKind::Action, Some(script("a", &[Status::Executing])));
    let (mut scheduler, id) = spawn(&log, graph);

    scheduler.advance(0.1);

    assert_eq!(
        TraceFormatter::format_instance(instance(&scheduler, id)),
        "patrol #1 [playing] state: Walk | residents: Senses | tree: Seq > Script (running)"
    );
}
