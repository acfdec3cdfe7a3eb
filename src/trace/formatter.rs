use crate::fsm::StatePhase;
use crate::graph::{NodeGraph, NodeId};
use crate::scheduler::{GraphInstance, PlayState};
use crate::tree::TreeState;
use itertools::Itertools;

/// Formats the execution state of graph instances into human-readable strings.
pub struct TraceFormatter;

impl TraceFormatter {
    /// One line describing what an instance is doing right now, e.g.
    /// `patrol #1 [playing] state: Walk | residents: Senses | tree: Selector > Wait (running)`.
    pub fn format_instance(instance: &GraphInstance) -> String {
        let graph = instance.graph();
        let mut parts = Vec::new();

        let fsm = instance.state_machine();
        if !fsm.is_empty() {
            let state = instance
                .current_state()
                .map_or_else(|| "-".to_string(), |id| Self::node_label(graph, id));
            parts.push(format!("state: {}", state));
            if !fsm.residents().is_empty() {
                let residents = fsm
                    .residents()
                    .iter()
                    .filter(|id| fsm.phase_of(**id) == StatePhase::ResidentActive)
                    .map(|id| Self::node_label(graph, *id))
                    .join(", ");
                parts.push(format!("residents: {}", residents));
            }
            if let Some(pending) = fsm.pending() {
                parts.push(format!("pending: {}", pending.name));
            }
        }

        if let Some(tree) = instance.tree() {
            parts.push(format!(
                "tree: {} ({})",
                Self::format_path(graph, tree.active_path()),
                Self::tree_state(tree.state())
            ));
        }

        format!(
            "{} {} [{}] {}",
            graph.name(),
            instance.id(),
            Self::play_state(instance.play_state()),
            parts.join(" | ")
        )
        .trim_end()
        .to_string()
    }

    /// The active tree path, root side first, joined with `>`.
    pub fn format_path(graph: &NodeGraph, path: &[NodeId]) -> String {
        if path.is_empty() {
            return "-".to_string();
        }
        path.iter().map(|id| Self::node_label(graph, *id)).join(" > ")
    }

    /// The node's name, or its first behaviour type, or its id.
    pub fn node_label(graph: &NodeGraph, id: NodeId) -> String {
        match graph.node(id) {
            Some(node) if !node.name.is_empty() => node.name.clone(),
            Some(node) => node
                .behaviours()
                .first()
                .map_or_else(|| id.to_string(), |spec| spec.type_name.clone()),
            None => id.to_string(),
        }
    }

    fn play_state(state: PlayState) -> &'static str {
        match state {
            PlayState::Stopped => "stopped",
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
        }
    }

    fn tree_state(state: TreeState) -> String {
        match state {
            TreeState::Idle => "idle".to_string(),
            TreeState::Running => "running".to_string(),
            TreeState::Finished(status) => format!("finished: {}", status),
        }
    }
}
