//! Graph model tests: editing rules, referential integrity, duplication and
//! serialized artifacts.
mod common;
use common::*;
use proptest::prelude::*;
use serde_json::json;
use shikumi::prelude::*;

fn invalid_branch(result: std::result::Result<impl std::fmt::Debug, GraphError>) -> bool {
    matches!(result, Err(GraphError::InvalidBranch { .. }))
}

/// A small mixed graph: two linked states with a data branch, and a tree.
fn sample_graph() -> (NodeGraph, NodeId, NodeId) {
    let mut graph = NodeGraph::new("sample");
    graph
        .parameters_mut()
        .add("speed", ValueType::Float, Value::Float(2.5))
        .unwrap();
    let idle = add_state(&mut graph, "Idle", vec![trigger_transition("go", "go")]);
    let walk = add_state(
        &mut graph,
        "Walk",
        vec![
            BehaviourSpec::new("Probe").with_output("count", ValueType::Int),
            BehaviourSpec::new("Reader")
                .with_config(json!({ "name": "r", "input": "value" }))
                .with_input_constant("value", ValueType::Float, Value::Float(1.0)),
        ],
    );
    link(&mut graph, idle, "go", Some(walk), TransitionTiming::Immediate);
    link(&mut graph, walk, "done", None, TransitionTiming::LateUpdate);
    graph
        .connect_slots(SlotRef::new(walk, 0, "count"), SlotRef::new(walk, 1, "value"))
        .unwrap();
    graph.set_start_state(idle).unwrap();

    let root = graph.create_named("Root", NodeKind::Root).unwrap();
    let sequence = add_child(&mut graph, root, "Seq", NodeKind::Composite, Some(BehaviourSpec::new("Sequencer")));
    add_child(&mut graph, sequence, "Wait", NodeKind::Action, Some(BehaviourSpec::new("Wait")));
    (graph, idle, walk)
}

#[test]
fn test_branch_rules() {
    let mut graph = NodeGraph::new("rules");
    let root = graph.create_node(NodeKind::Root).unwrap();
    let decorator = graph.create_node(NodeKind::Decorator).unwrap();
    let composite = graph.create_node(NodeKind::Composite).unwrap();
    let action = graph.create_node(NodeKind::Action).unwrap();
    let other = graph.create_node(NodeKind::Action).unwrap();
    let service = graph.create_node(NodeKind::Service).unwrap();
    let state = graph.create_node(NodeKind::state()).unwrap();

    assert!(invalid_branch(graph.create_branch(action, action)));
    assert!(invalid_branch(graph.create_branch(state, action)));
    assert!(invalid_branch(graph.create_branch(composite, root)));
    assert!(invalid_branch(graph.create_branch(action, other)));
    assert!(invalid_branch(graph.create_branch(decorator, service)));

    graph.create_branch(root, decorator).unwrap();
    assert!(invalid_branch(graph.create_branch(root, composite)));
    graph.create_branch(decorator, composite).unwrap();
    assert!(invalid_branch(graph.create_branch(decorator, other)));

    graph.create_branch(composite, action).unwrap();
    assert!(invalid_branch(graph.create_branch(composite, decorator)));
    graph.create_branch(action, service).unwrap();
    assert_eq!(graph.services(action), vec![service]);
    assert!(graph.children(action).is_empty());
}

#[test]
fn test_branch_cannot_close_a_cycle() {
    let mut graph = NodeGraph::new("cycle");
    let a = graph.create_node(NodeKind::Composite).unwrap();
    let b = graph.create_node(NodeKind::Composite).unwrap();
    let c = graph.create_node(NodeKind::Composite).unwrap();
    graph.create_branch(a, b).unwrap();
    graph.create_branch(b, c).unwrap();

    assert!(invalid_branch(graph.create_branch(c, a)));
    assert_eq!(graph.branches().len(), 2);
}

#[test]
fn test_children_keep_creation_order() {
    let mut graph = NodeGraph::new("order");
    let parent = graph.create_node(NodeKind::Composite).unwrap();
    let first = graph.create_node(NodeKind::Action).unwrap();
    let second = graph.create_node(NodeKind::Action).unwrap();
    let third = graph.create_node(NodeKind::Action).unwrap();
    let first_branch = graph.create_branch(parent, first).unwrap();
    graph.create_branch(parent, second).unwrap();

    assert!(graph.disconnect_branch(first_branch));
    graph.create_branch(parent, first).unwrap();
    graph.create_branch(parent, third).unwrap();

    assert_eq!(graph.children(parent), vec![second, first, third]);
    assert_eq!(graph.parent_of(first), Some(parent));
}

#[test]
fn test_only_one_root() {
    let mut graph = NodeGraph::new("roots");
    let root = graph.create_node(NodeKind::Root).unwrap();

    assert_eq!(graph.create_node(NodeKind::Root), Err(GraphError::DuplicateRoot(root)));
    assert_eq!(graph.root(), Some(root));
}

#[test]
fn test_behaviour_capacity_per_kind() {
    let mut graph = NodeGraph::new("capacity");
    let root = graph.create_node(NodeKind::Root).unwrap();
    let action = graph.create_node(NodeKind::Action).unwrap();
    let state = graph.create_node(NodeKind::state()).unwrap();

    assert!(matches!(
        graph.add_behaviour(root, BehaviourSpec::new("Wait")),
        Err(GraphError::InvalidBehaviour { .. })
    ));
    assert_eq!(graph.add_behaviour(action, BehaviourSpec::new("Wait")), Ok(0));
    assert!(matches!(
        graph.add_behaviour(action, BehaviourSpec::new("Wait")),
        Err(GraphError::InvalidBehaviour { .. })
    ));
    for i in 0..3 {
        assert_eq!(graph.add_behaviour(state, probe("p")), Ok(i));
    }
    let missing = NodeId::new(99);
    assert_eq!(
        graph.add_behaviour(missing, probe("p")),
        Err(GraphError::NodeNotFound(missing))
    );
}

#[test]
fn test_link_rules() {
    let mut graph = NodeGraph::new("links");
    let a = graph.create_named("A", NodeKind::state()).unwrap();
    let b = graph.create_named("B", NodeKind::state()).unwrap();
    let resident = graph.create_named("R", NodeKind::resident_state()).unwrap();
    let action = graph.create_node(NodeKind::Action).unwrap();

    graph
        .add_link(a, StateLink::new("next", Some(b), TransitionTiming::LateUpdate))
        .unwrap();
    assert_eq!(
        graph.add_link(a, StateLink::new("next", None, TransitionTiming::Immediate)),
        Err(GraphError::DuplicateLink {
            state: a,
            name: "next".to_string()
        })
    );
    assert_eq!(
        graph.add_link(action, StateLink::new("x", None, TransitionTiming::Immediate)),
        Err(GraphError::NotAState(action))
    );
    assert_eq!(
        graph.add_link(a, StateLink::new("home", Some(resident), TransitionTiming::Immediate)),
        Err(GraphError::NotAState(resident))
    );
    assert_eq!(graph.set_start_state(resident), Err(GraphError::NotAState(resident)));

    // Residents may link to transient states.
    graph
        .add_link(resident, StateLink::new("alarm", Some(a), TransitionTiming::Immediate))
        .unwrap();
    assert!(graph.link(a, "next").is_some_and(|link| link.target == Some(b)));
    assert!(graph.remove_link(a, "next"));
    assert!(graph.link(a, "next").is_none());
}

#[test]
fn test_start_state_defaults_to_first_transient_state() {
    let mut graph = NodeGraph::new("start");
    graph.create_node(NodeKind::resident_state()).unwrap();
    let first = graph.create_node(NodeKind::state()).unwrap();
    let second = graph.create_node(NodeKind::state()).unwrap();

    assert_eq!(graph.start_state(), Some(first));
    graph.set_start_state(second).unwrap();
    assert_eq!(graph.start_state(), Some(second));
}

#[test]
fn test_remove_node_prunes_every_reference() {
    let (mut graph, idle, walk) = sample_graph();
    let sequence = graph
        .nodes()
        .iter()
        .find(|node| node.name == "Seq")
        .map(Node::id)
        .unwrap();

    assert!(graph.remove_node(idle));
    assert_eq!(graph.start_state(), Some(walk));
    assert!(!graph.contains(idle));
    assert!(graph.node(idle).is_none());

    assert!(graph.remove_node(walk));
    assert!(graph.data_branches().is_empty());
    assert_eq!(graph.start_state(), None);

    assert_eq!(graph.branches().len(), 2);
    assert!(graph.remove_node(sequence));
    assert!(graph.branches().is_empty());
    assert!(!graph.remove_node(sequence));
}

#[test]
fn test_remove_node_clears_links_into_it() {
    let mut graph = NodeGraph::new("links");
    let a = graph.create_named("A", NodeKind::state()).unwrap();
    let b = graph.create_named("B", NodeKind::state()).unwrap();
    graph
        .add_link(a, StateLink::new("next", Some(b), TransitionTiming::LateUpdate))
        .unwrap();
    graph
        .add_link(a, StateLink::new("exit", None, TransitionTiming::LateUpdate))
        .unwrap();

    graph.remove_node(b);

    assert!(graph.link(a, "next").is_none());
    assert!(graph.link(a, "exit").is_some());
}

#[test]
fn test_ids_are_not_reused_after_removal() {
    let mut graph = NodeGraph::new("ids");
    let a = graph.create_node(NodeKind::state()).unwrap();
    let b = graph.create_node(NodeKind::state()).unwrap();
    graph.remove_node(b);

    let c = graph.create_node(NodeKind::state()).unwrap();

    assert_ne!(c, a);
    assert_ne!(c, b);
}

#[test]
fn test_duplicate_clip_keeps_free_ids() {
    let (source, idle, walk) = sample_graph();
    let mut target = NodeGraph::new("target");

    let map = target.duplicate_from(&source, &[idle, walk], DuplicateMode::Clip);

    assert_eq!(map[&idle], idle);
    assert_eq!(map[&walk], walk);
    assert_eq!(target.link(idle, "go").and_then(|link| link.target), Some(walk));
    assert_eq!(target.data_branches().len(), 1);
    assert_eq!(target.start_state(), Some(idle));
}

#[test]
fn test_duplicate_into_same_graph_remaps_links() {
    let (mut graph, idle, walk) = sample_graph();
    let before = graph.nodes().len();

    let source = graph.clone();
    let map = graph.duplicate_from(&source, &[idle, walk], DuplicateMode::Clip);

    let (new_idle, new_walk) = (map[&idle], map[&walk]);
    assert_ne!(new_idle, idle);
    assert_ne!(new_walk, walk);
    assert_eq!(graph.nodes().len(), before + 2);
    assert_eq!(graph.link(new_idle, "go").and_then(|link| link.target), Some(new_walk));
    assert_eq!(graph.link(idle, "go").and_then(|link| link.target), Some(walk));
    assert_eq!(graph.data_branches().len(), 2);
    // The existing start state wins.
    assert_eq!(graph.start_state(), Some(idle));
}

#[test]
fn test_duplicate_drops_links_to_missing_targets() {
    let (source, idle, _) = sample_graph();
    let mut target = NodeGraph::new("target");

    let map = target.duplicate_from(&source, &[idle], DuplicateMode::Fresh);

    let copy = map[&idle];
    assert!(target.link(copy, "go").is_some_and(|link| link.target.is_none()));
}

#[test]
fn test_duplicate_subtree_copies_branches_but_not_a_second_root() {
    let (source, _, _) = sample_graph();
    let root = source.root().unwrap();
    let mut target = NodeGraph::new("target");
    target.create_node(NodeKind::Root).unwrap();

    let map = target.duplicate_subtree(&source, root, DuplicateMode::Fresh);

    assert!(!map.contains_key(&root));
    assert_eq!(map.len(), 2);
    assert_eq!(target.branches().len(), 1);
    let sequence = source.children(root)[0];
    assert_eq!(target.children(map[&sequence]).len(), 1);
}

#[test]
fn test_bincode_round_trip_preserves_graph() {
    let (graph, idle, walk) = sample_graph();

    let bytes = graph.to_bytes().unwrap();
    let mut loaded = NodeGraph::from_bytes(&bytes).unwrap();

    assert_eq!(loaded.to_json_string().unwrap(), graph.to_json_string().unwrap());
    assert_eq!(loaded.start_state(), Some(idle));
    assert_eq!(
        loaded.node(walk).unwrap().behaviours()[1].config,
        json!({ "name": "r", "input": "value" })
    );
    // Allocators survive, so new ids do not collide.
    let fresh = loaded.create_node(NodeKind::state()).unwrap();
    assert!(graph.node(fresh).is_none());
}

#[test]
fn test_hand_written_json_loads_and_runs() {
    let text = r#"{
        "name": "door",
        "nodes": [
            { "id": 1, "name": "Closed", "kind": { "state": { "resident": false, "links": [
                { "name": "open", "target": 2, "timing": "immediate" }
            ] } },
              "behaviours": [ { "type_name": "TriggerTransition", "config": { "trigger": "push", "link": "open" } } ] },
            { "id": 2, "name": "Open", "kind": { "state": { "resident": false, "links": [] } } }
        ]
    }"#;
    let graph = NodeGraph::from_json_str(text).unwrap();
    assert_eq!(graph.states().count(), 2);

    let log = new_log();
    let (mut scheduler, id) = spawn(&log, graph);
    scheduler.send_trigger(id, "push").unwrap();

    assert_eq!(instance(&scheduler, id).current_state(), Some(NodeId::new(2)));
}

#[test]
fn test_artifact_errors() {
    assert!(matches!(
        NodeGraph::from_bytes(&[0xff, 0x00]),
        Err(ArtifactError::Deserialize(_))
    ));
    assert!(matches!(
        NodeGraph::from_json_str("{ not json"),
        Err(ArtifactError::Deserialize(_))
    ));
    assert!(matches!(
        NodeGraph::from_file("/definitely/not/here.bin"),
        Err(ArtifactError::Io { .. })
    ));
}

#[test]
fn test_loading_prunes_references_to_missing_nodes() {
    let text = r#"{
        "name": "broken",
        "nodes": [
            { "id": 1, "name": "Root", "kind": "root" },
            { "id": 3, "name": "Idle", "kind": { "state": { "resident": false, "links": [
                { "name": "go", "target": 9, "timing": "immediate" },
                { "name": "done", "target": null, "timing": "late_update" }
            ] } } }
        ],
        "branches": [ { "id": 1, "parent": 1, "child": 2, "order": 0 } ],
        "start_state": 7
    }"#;

    let mut graph = NodeGraph::from_json_str(text).unwrap();

    assert!(graph.branches().is_empty());
    let idle = NodeId::new(3);
    assert!(graph.link(idle, "go").is_none());
    assert!(graph.link(idle, "done").is_some());
    assert_eq!(graph.start_state(), Some(idle));

    let action = graph.create_node(NodeKind::Action).unwrap();
    assert_eq!(action, NodeId::new(4));
    graph.create_branch(NodeId::new(1), action).unwrap();
    assert_eq!(graph.children(NodeId::new(1)), vec![action]);
}

#[test]
fn test_loading_rejects_repeated_node_ids() {
    let text = r#"{
        "name": "twins",
        "nodes": [
            { "id": 1, "name": "A", "kind": "action" },
            { "id": 1, "name": "B", "kind": "action" }
        ]
    }"#;

    let error = NodeGraph::from_json_str(text).unwrap_err();

    assert!(matches!(&error, ArtifactError::Deserialize(message) if message.contains("duplicate node id")));
}

#[test]
fn test_loading_rejects_ids_beyond_the_id_space() {
    let text = format!(
        r#"{{ "name": "edge", "nodes": [ {{ "id": {}, "name": "A", "kind": "action" }} ] }}"#,
        u32::MAX
    );

    let error = NodeGraph::from_json_str(&text).unwrap_err();

    assert!(matches!(&error, ArtifactError::Deserialize(message) if message.contains("out of range")));
}

#[test]
fn test_exhausted_node_ids_are_reported() {
    let text = format!(
        r#"{{ "name": "full", "nodes": [ {{ "id": {}, "name": "A", "kind": "action" }} ] }}"#,
        u32::MAX - 1
    );
    let mut graph = NodeGraph::from_json_str(&text).unwrap();

    assert_eq!(
        graph.create_node(NodeKind::Action),
        Err(GraphError::IdsExhausted("node"))
    );
    assert_eq!(graph.nodes().len(), 1);
}

#[test]
fn test_save_and_load_file() {
    let (graph, _, _) = sample_graph();
    let path = std::env::temp_dir().join(format!("shikumi-graph-{}.bin", std::process::id()));
    let path = path.to_str().unwrap();

    graph.save(path).unwrap();
    let loaded = NodeGraph::from_file(path).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(loaded.name(), "sample");
    assert_eq!(loaded.parameters().get_value("speed"), Some(Value::Float(2.5)));
}

struct Chain(Vec<&'static str>);

impl IntoGraph for Chain {
    fn into_graph(self) -> std::result::Result<NodeGraph, GraphError> {
        let mut graph = NodeGraph::new("chain");
        let ids = self
            .0
            .iter()
            .map(|name| graph.create_named(name, NodeKind::state()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pair in ids.windows(2) {
            graph.add_link(pair[0], StateLink::new("next", Some(pair[1]), TransitionTiming::LateUpdate))?;
        }
        Ok(graph)
    }
}

#[test]
fn test_into_graph_conversion() {
    let graph = Chain(vec!["A", "B", "C"]).into_graph().unwrap();

    assert_eq!(graph.states().count(), 3);
    let a = graph.start_state().unwrap();
    let b = graph.link(a, "next").and_then(|link| link.target).unwrap();
    assert_eq!(graph.node(b).unwrap().name, "B");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Whatever branches are requested, every accepted edit leaves a forest:
    /// one parent per node and no cycles.
    #[test]
    fn prop_branch_edits_keep_a_forest(edges in prop::collection::vec((0usize..6, 0usize..6), 0..24)) {
        let mut graph = NodeGraph::new("forest");
        let nodes: Vec<NodeId> = (0..6)
            .map(|_| graph.create_node(NodeKind::Composite).unwrap())
            .collect();

        let mut accepted = Vec::new();
        for (parent, child) in edges {
            if let Ok(branch) = graph.create_branch(nodes[parent], nodes[child]) {
                accepted.push(branch);
            }
        }

        for &node in &nodes {
            let parents = graph.branches().iter().filter(|b| b.child() == node).count();
            prop_assert!(parents <= 1);
            let mut steps = 0;
            let mut current = graph.parent_of(node);
            while let Some(parent) = current {
                prop_assert_ne!(parent, node);
                steps += 1;
                prop_assert!(steps <= nodes.len());
                current = graph.parent_of(parent);
            }
        }

        // Creating a branch and disconnecting it right away restores the branch set.
        let snapshot = |graph: &NodeGraph| {
            graph
                .branches()
                .iter()
                .map(|b| (b.id(), b.parent(), b.child(), b.order()))
                .collect::<Vec<_>>()
        };
        let before = snapshot(&graph);
        for (parent, child) in [(0, 5), (5, 0), (2, 3)] {
            if let Ok(branch) = graph.create_branch(nodes[parent], nodes[child]) {
                prop_assert!(graph.disconnect_branch(branch));
            }
            prop_assert_eq!(snapshot(&graph), before.clone());
        }

        for branch in accepted {
            prop_assert!(graph.disconnect_branch(branch));
        }
        prop_assert!(graph.branches().is_empty());
    }
}
