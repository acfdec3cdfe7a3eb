//! Copying nodes between graphs while keeping every reference consistent.

use super::{BranchId, DataBranchId, NodeBranch, NodeGraph, NodeId};
use crate::dataflow::DataBranch;
use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

/// How node ids are chosen for duplicated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMode {
    /// Paste in place: keep the source ids unless they are already taken.
    Clip,
    /// Allocate fresh ids for every node.
    Fresh,
}

impl NodeGraph {
    /// Copies `ids` from `source` into this graph and returns the old-to-new id map.
    ///
    /// Branches and data branches are copied when both endpoints were copied. State
    /// links pointing at a copied node are remapped; links pointing elsewhere are kept
    /// only if their target also exists in this graph, and cleared otherwise. Unknown
    /// ids and a second behaviour tree root are skipped.
    pub fn duplicate_from(
        &mut self,
        source: &NodeGraph,
        ids: &[NodeId],
        mode: DuplicateMode,
    ) -> AHashMap<NodeId, NodeId> {
        let mut map = AHashMap::new();
        let mut copied = Vec::new();

        for &old in ids {
            if map.contains_key(&old) {
                continue;
            }
            let Some(node) = source.node(old) else {
                debug!(node = %old, "duplicate: source node not found");
                continue;
            };
            if matches!(node.kind, super::NodeKind::Root) && self.root().is_some() {
                debug!(node = %old, "duplicate: graph already has a root");
                continue;
            }
            let taken = self.contains(old) || map.values().any(|&used| used == old);
            let keep_id = mode == DuplicateMode::Clip && !taken && self.node_ids.reserve(old.0);
            let new = if keep_id {
                old
            } else {
                let Some(raw) = self.node_ids.allocate() else {
                    warn!(node = %old, "duplicate: no node ids left");
                    continue;
                };
                NodeId(raw)
            };
            map.insert(old, new);
            copied.push((new, node.clone()));
        }

        for (new, mut node) in copied {
            node.id = new;
            if let Some(state) = node.state_mut() {
                for link in &mut state.links {
                    link.target = match link.target {
                        Some(target) => match map.get(&target) {
                            Some(&remapped) => Some(remapped),
                            None if self.contains(target) => Some(target),
                            None => None,
                        },
                        None => None,
                    };
                }
            }
            self.insert_node(node);
        }

        let branches: Vec<_> = source
            .branches
            .iter()
            .filter_map(|branch| {
                Some((*map.get(&branch.parent)?, *map.get(&branch.child)?, branch.order))
            })
            .collect();
        for (parent, child, order) in branches {
            let Some(raw) = self.branch_ids.allocate() else {
                warn!(parent = %parent, child = %child, "duplicate: no branch ids left");
                break;
            };
            self.branches.push(NodeBranch {
                id: BranchId(raw),
                parent,
                child,
                order,
            });
        }

        let data_branches: Vec<_> = source
            .data_branches
            .iter()
            .filter_map(|branch| {
                let mut output = branch.output.clone();
                let mut input = branch.input.clone();
                output.node = *map.get(&output.node)?;
                input.node = *map.get(&input.node)?;
                Some((output, input))
            })
            .collect();
        for (output, input) in data_branches {
            let Some(raw) = self.data_branch_ids.allocate() else {
                warn!(input = %input, "duplicate: no data branch ids left");
                break;
            };
            self.data_branches.push(DataBranch {
                id: DataBranchId(raw),
                output,
                input,
            });
        }

        if self.start_state.is_none() {
            if let Some(start) = source.start_state.and_then(|s| map.get(&s)) {
                self.start_state = Some(*start);
            }
        }
        map
    }

    /// Copies a subtree (the node, its descendants and their services) into this graph.
    pub fn duplicate_subtree(
        &mut self,
        source: &NodeGraph,
        top: NodeId,
        mode: DuplicateMode,
    ) -> AHashMap<NodeId, NodeId> {
        let mut seen = AHashSet::new();
        let mut stack = vec![top];
        let mut order = Vec::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            order.push(node);
            stack.extend(
                source
                    .branches
                    .iter()
                    .filter(|branch| branch.parent == node)
                    .map(NodeBranch::child),
            );
        }
        self.duplicate_from(source, &order, mode)
    }
}
