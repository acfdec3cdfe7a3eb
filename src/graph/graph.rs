use super::ids::IdAllocator;
use super::{BehaviourSpec, BranchId, DataBranchId, Node, NodeId, NodeKind, StateLink};
use crate::behaviour::TickPhase;
use crate::dataflow::{DataBranch, SlotDef, SlotRef};
use crate::error::{GraphError, SlotError};
use crate::parameter::ParameterContainer;
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A parent-to-child edge of the behaviour tree.
///
/// `order` fixes the child's priority among its siblings; lower runs first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBranch {
    pub(crate) id: BranchId,
    pub(crate) parent: NodeId,
    pub(crate) child: NodeId,
    pub(crate) order: u32,
}

impl NodeBranch {
    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn child(&self) -> NodeId {
        self.child
    }

    pub fn order(&self) -> u32 {
        self.order
    }
}

/// Per-graph execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Restart the behaviour tree from the root after it finishes.
    #[serde(default)]
    pub restart_on_finish: bool,
    /// The pass in which tree leaves execute.
    #[serde(default)]
    pub tree_phase: TickPhase,
    /// Start playing as soon as a scheduler spawns the graph.
    #[serde(default = "default_true")]
    pub play_on_start: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            restart_on_finish: false,
            tree_phase: TickPhase::Update,
            play_on_start: true,
        }
    }
}

/// Node storage and connectivity of one graph.
///
/// Nodes live in a flat arena indexed by [`NodeId`]. Everything that points at a
/// node (branches, data branches, state links) does so by id, and every edit goes
/// through the methods below so that no reference is left dangling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphData", into = "GraphData")]
pub struct NodeGraph {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: AHashMap<NodeId, usize>,
    pub(crate) branches: Vec<NodeBranch>,
    pub(crate) data_branches: Vec<DataBranch>,
    pub(crate) node_ids: IdAllocator,
    pub(crate) branch_ids: IdAllocator,
    pub(crate) data_branch_ids: IdAllocator,
    pub(crate) start_state: Option<NodeId>,
    pub(crate) parameters: ParameterContainer,
    pub(crate) settings: GraphSettings,
}

/// Serialized shape of a [`NodeGraph`]; the lookup index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct GraphData {
    name: String,
    nodes: Vec<Node>,
    #[serde(default)]
    branches: Vec<NodeBranch>,
    #[serde(default)]
    data_branches: Vec<DataBranch>,
    #[serde(default)]
    node_ids: IdAllocator,
    #[serde(default)]
    branch_ids: IdAllocator,
    #[serde(default)]
    data_branch_ids: IdAllocator,
    #[serde(default)]
    start_state: Option<NodeId>,
    #[serde(default)]
    parameters: ParameterContainer,
    #[serde(default)]
    settings: GraphSettings,
}

impl TryFrom<GraphData> for NodeGraph {
    type Error = GraphError;

    fn try_from(data: GraphData) -> Result<Self, GraphError> {
        let mut graph = NodeGraph {
            name: data.name,
            nodes: data.nodes,
            index: AHashMap::new(),
            branches: data.branches,
            data_branches: data.data_branches,
            node_ids: data.node_ids,
            branch_ids: data.branch_ids,
            data_branch_ids: data.data_branch_ids,
            start_state: data.start_state,
            parameters: data.parameters,
            settings: data.settings,
        };
        graph.rebuild_index();
        if graph.index.len() != graph.nodes.len() {
            let duplicate = graph
                .nodes
                .iter()
                .map(Node::id)
                .duplicates()
                .next()
                .map_or_else(String::new, |id| id.to_string());
            return Err(GraphError::InvalidData(format!("duplicate node id '{}'", duplicate)));
        }

        // Hand-written files may omit the allocators entirely.
        let out_of_range = |what: &str, raw: u32| {
            GraphError::InvalidData(format!("{} id {} is out of range", what, raw))
        };
        for node in &graph.nodes {
            if !graph.node_ids.reserve(node.id.0) {
                return Err(out_of_range("node", node.id.0));
            }
        }
        for branch in &graph.branches {
            if !graph.branch_ids.reserve(branch.id.0) {
                return Err(out_of_range("branch", branch.id.0));
            }
        }
        for branch in &graph.data_branches {
            if !graph.data_branch_ids.reserve(branch.id.0) {
                return Err(out_of_range("data branch", branch.id.0));
            }
        }
        graph.prune_dangling();
        Ok(graph)
    }
}

impl From<NodeGraph> for GraphData {
    fn from(graph: NodeGraph) -> Self {
        GraphData {
            name: graph.name,
            nodes: graph.nodes,
            branches: graph.branches,
            data_branches: graph.data_branches,
            node_ids: graph.node_ids,
            branch_ids: graph.branch_ids,
            data_branch_ids: graph.data_branch_ids,
            start_state: graph.start_state,
            parameters: graph.parameters,
            settings: graph.settings,
        }
    }
}

fn reject<T>(error: GraphError) -> Result<T, GraphError> {
    warn!(error = %error, "graph edit rejected");
    Err(error)
}

impl NodeGraph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut GraphSettings {
        &mut self.settings
    }

    /// Parameter definitions. Every instance starts from a copy of this container.
    pub fn parameters(&self) -> &ParameterContainer {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterContainer {
        &mut self.parameters
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, i))
            .collect();
    }

    /// Drops every reference to a node that does not exist. Only loaded data can
    /// hold such references; edits keep the graph consistent on their own.
    fn prune_dangling(&mut self) {
        let index = &self.index;
        self.branches.retain(|branch| {
            let keep = index.contains_key(&branch.parent) && index.contains_key(&branch.child);
            if !keep {
                warn!(branch = %branch.id, "pruned branch to a missing node");
            }
            keep
        });
        self.data_branches.retain(|branch| {
            let keep = index.contains_key(&branch.output.node) && index.contains_key(&branch.input.node);
            if !keep {
                warn!(branch = %branch.id, "pruned data branch to a missing node");
            }
            keep
        });
        for node in &mut self.nodes {
            let owner = node.id;
            if let Some(state) = node.state_mut() {
                state.links.retain(|link| {
                    let dangling = link.target.is_some_and(|target| !index.contains_key(&target));
                    if dangling {
                        warn!(state = %owner, link = %link.name, "pruned link to a missing state");
                    }
                    !dangling
                });
            }
        }
        if let Some(start) = self.start_state.filter(|start| !index.contains_key(start)) {
            warn!(node = %start, "start state is missing, cleared");
            self.start_state = None;
        }
    }

    // --- Nodes ---

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Mutable access to a node's editor fields (name, position).
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let i = *self.index.get(&id)?;
        self.nodes.get_mut(i)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Creates a node with a fresh id.
    pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeId, GraphError> {
        if matches!(kind, NodeKind::Root) {
            if let Some(root) = self.root() {
                return reject(GraphError::DuplicateRoot(root));
            }
        }
        let Some(raw) = self.node_ids.allocate() else {
            return reject(GraphError::IdsExhausted("node"));
        };
        let id = NodeId(raw);
        self.insert_node(Node {
            id,
            name: String::new(),
            position: Default::default(),
            kind,
            behaviours: Vec::new(),
        });
        Ok(id)
    }

    /// Creates a named node with a fresh id.
    pub fn create_named(&mut self, name: &str, kind: NodeKind) -> Result<NodeId, GraphError> {
        let id = self.create_node(kind)?;
        if let Some(node) = self.node_mut(id) {
            node.name = name.to_string();
        }
        Ok(id)
    }

    /// Stores a node whose id the caller has already allocated or reserved.
    pub(crate) fn insert_node(&mut self, node: Node) {
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    /// Removes a node together with every branch, data branch and state link
    /// that references it. Returns `false` when the node does not exist.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            warn!(node = %id, "remove_node: node not found");
            return false;
        }
        self.nodes.retain(|node| node.id != id);
        self.rebuild_index();

        self.branches
            .retain(|branch| branch.parent != id && branch.child != id);
        self.data_branches
            .retain(|branch| branch.output.node != id && branch.input.node != id);
        for node in &mut self.nodes {
            let owner = node.id;
            if let Some(state) = node.state_mut() {
                state.links.retain(|link| {
                    let dangling = link.target == Some(id);
                    if dangling {
                        debug!(state = %owner, link = %link.name, "pruned link to removed state");
                    }
                    !dangling
                });
            }
        }
        if self.start_state == Some(id) {
            self.start_state = None;
        }
        true
    }

    /// The behaviour tree root, if the graph has one.
    pub fn root(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| matches!(node.kind, NodeKind::Root))
            .map(Node::id)
    }

    // --- Behaviours ---

    /// Attaches a behaviour to a node and returns its index on that node.
    pub fn add_behaviour(&mut self, node: NodeId, spec: BehaviourSpec) -> Result<usize, GraphError> {
        let Some(target) = self.node_mut(node) else {
            return reject(GraphError::NodeNotFound(node));
        };
        if let Some(capacity) = target.kind.behaviour_capacity() {
            if target.behaviours.len() >= capacity {
                return reject(GraphError::InvalidBehaviour {
                    node,
                    message: format!("node accepts at most {} behaviour(s)", capacity),
                });
            }
        }
        target.behaviours.push(spec);
        Ok(target.behaviours.len() - 1)
    }

    /// Detaches a behaviour, dropping its data branches and re-addressing the
    /// slots of the behaviours that follow it.
    pub fn remove_behaviour(&mut self, node: NodeId, index: usize) -> bool {
        let Some(target) = self.node_mut(node) else {
            warn!(node = %node, "remove_behaviour: node not found");
            return false;
        };
        if index >= target.behaviours.len() {
            warn!(node = %node, index, "remove_behaviour: index out of range");
            return false;
        }
        target.behaviours.remove(index);

        let touches = |slot: &SlotRef| slot.node == node && slot.behaviour == index;
        self.data_branches
            .retain(|branch| !touches(&branch.output) && !touches(&branch.input));
        for branch in &mut self.data_branches {
            for slot in [&mut branch.output, &mut branch.input] {
                if slot.node == node && slot.behaviour > index {
                    slot.behaviour -= 1;
                }
            }
        }
        true
    }

    // --- Tree branches ---

    pub fn branches(&self) -> &[NodeBranch] {
        &self.branches
    }

    pub fn branch(&self, id: BranchId) -> Option<&NodeBranch> {
        self.branches.iter().find(|branch| branch.id == id)
    }

    /// Connects `parent` to `child`. The child is appended after the parent's
    /// existing children, which fixes its priority.
    pub fn create_branch(&mut self, parent: NodeId, child: NodeId) -> Result<BranchId, GraphError> {
        let Some(parent_node) = self.node(parent) else {
            return reject(GraphError::NodeNotFound(parent));
        };
        let Some(child_node) = self.node(child) else {
            return reject(GraphError::NodeNotFound(child));
        };
        let invalid = |message: &str| GraphError::InvalidBranch {
            parent,
            child,
            message: message.to_string(),
        };

        if parent == child {
            return reject(invalid("a node cannot be its own child"));
        }
        if !parent_node.kind.is_tree_node() || !child_node.kind.is_tree_node() {
            return reject(invalid("only behaviour tree nodes can be branched"));
        }
        if matches!(child_node.kind, NodeKind::Root) {
            return reject(invalid("the root cannot be a child"));
        }
        if self.parent_of(child).is_some() {
            return reject(invalid("the child already has a parent"));
        }
        let is_service = matches!(child_node.kind, NodeKind::Service);
        let status_children = self.children(parent).len();
        match (&parent_node.kind, is_service) {
            (NodeKind::Service, _) => return reject(invalid("services cannot have children")),
            (NodeKind::Composite | NodeKind::Action, true) => {}
            (_, true) => {
                return reject(invalid("services attach to composites and actions only"));
            }
            (NodeKind::Action, false) => return reject(invalid("actions are leaves")),
            (NodeKind::Root | NodeKind::Decorator, false) if status_children >= 1 => {
                return reject(invalid("this node wraps exactly one child"));
            }
            _ => {}
        }
        if self.ancestors(parent).contains(&child) {
            return reject(invalid("the branch would create a cycle"));
        }

        let order = self
            .branches
            .iter()
            .filter(|branch| branch.parent == parent)
            .map(|branch| branch.order + 1)
            .max()
            .unwrap_or(0);
        let Some(raw) = self.branch_ids.allocate() else {
            return reject(GraphError::IdsExhausted("branch"));
        };
        let id = BranchId(raw);
        self.branches.push(NodeBranch {
            id,
            parent,
            child,
            order,
        });
        Ok(id)
    }

    /// Removes a branch. Returns `false` when the branch does not exist.
    pub fn disconnect_branch(&mut self, id: BranchId) -> bool {
        let before = self.branches.len();
        self.branches.retain(|branch| branch.id != id);
        let removed = before != self.branches.len();
        if !removed {
            warn!(branch = %id, "disconnect_branch: branch not found");
        }
        removed
    }

    pub fn parent_of(&self, child: NodeId) -> Option<NodeId> {
        self.branches
            .iter()
            .find(|branch| branch.child == child)
            .map(NodeBranch::parent)
    }

    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(node);
        while let Some(parent) = current {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    fn ordered_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.branches
            .iter()
            .filter(move |branch| branch.parent == parent)
            .sorted_by_key(|branch| branch.order)
            .map(NodeBranch::child)
    }

    /// Status-bearing children of a tree node, in priority order.
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.ordered_children(parent)
            .filter(|child| {
                self.node(*child)
                    .is_some_and(|node| !matches!(node.kind, NodeKind::Service))
            })
            .collect()
    }

    /// Services attached to a tree node, in declaration order.
    pub fn services(&self, parent: NodeId) -> Vec<NodeId> {
        self.ordered_children(parent)
            .filter(|child| {
                self.node(*child)
                    .is_some_and(|node| matches!(node.kind, NodeKind::Service))
            })
            .collect()
    }

    // --- State machine ---

    pub fn start_state(&self) -> Option<NodeId> {
        self.start_state.or_else(|| {
            self.nodes
                .iter()
                .find(|node| node.kind.is_state() && !node.is_resident())
                .map(Node::id)
        })
    }

    pub fn set_start_state(&mut self, state: NodeId) -> Result<(), GraphError> {
        match self.node(state) {
            Some(node) if node.kind.is_state() && !node.is_resident() => {
                self.start_state = Some(state);
                Ok(())
            }
            Some(_) => reject(GraphError::NotAState(state)),
            None => reject(GraphError::NodeNotFound(state)),
        }
    }

    pub fn states(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.kind.is_state())
    }

    /// Adds a named link to a state. Link names are unique per state.
    pub fn add_link(&mut self, state: NodeId, link: StateLink) -> Result<(), GraphError> {
        if let Some(target) = link.target {
            if !self.node(target).is_some_and(|n| n.kind.is_state() && !n.is_resident()) {
                return reject(GraphError::NotAState(target));
            }
        }
        let Some(node) = self.node_mut(state) else {
            return reject(GraphError::NodeNotFound(state));
        };
        let Some(state_node) = node.state_mut() else {
            return reject(GraphError::NotAState(state));
        };
        if state_node.link(&link.name).is_some() {
            return reject(GraphError::DuplicateLink {
                state,
                name: link.name,
            });
        }
        state_node.links.push(link);
        Ok(())
    }

    pub fn remove_link(&mut self, state: NodeId, name: &str) -> bool {
        let Some(state_node) = self.node_mut(state).and_then(Node::state_mut) else {
            warn!(state = %state, "remove_link: state not found");
            return false;
        };
        let before = state_node.links.len();
        state_node.links.retain(|link| link.name != name);
        before != state_node.links.len()
    }

    /// Finds a link by name on a state.
    pub fn link(&self, state: NodeId, name: &str) -> Option<&StateLink> {
        self.node(state)?.state()?.link(name)
    }

    // --- Data flow ---

    pub fn data_branches(&self) -> &[DataBranch] {
        &self.data_branches
    }

    pub fn data_branch(&self, id: DataBranchId) -> Option<&DataBranch> {
        self.data_branches.iter().find(|branch| branch.id == id)
    }

    pub fn output_def(&self, slot: &SlotRef) -> Option<&SlotDef> {
        self.node(slot.node)?
            .behaviours
            .get(slot.behaviour)?
            .output(&slot.slot)
    }

    pub fn input_def(&self, slot: &SlotRef) -> Option<&SlotDef> {
        self.node(slot.node)?
            .behaviours
            .get(slot.behaviour)?
            .input(&slot.slot)
    }

    /// Connects an output slot to an input slot.
    ///
    /// The input type must be assignable from the output type; the check happens
    /// here, never at read time. An input has a single source, so connecting an
    /// already connected input replaces its previous data branch.
    pub fn connect_slots(&mut self, output: SlotRef, input: SlotRef) -> Result<DataBranchId, GraphError> {
        let Some(output_def) = self.output_def(&output) else {
            return reject(SlotError::NotFound(output).into());
        };
        let Some(input_def) = self.input_def(&input) else {
            return reject(SlotError::NotFound(input).into());
        };
        if !input_def.value_type.is_assignable_from(&output_def.value_type) {
            let error = SlotError::IncompatibleTypes {
                output_type: output_def.value_type.clone(),
                input_type: input_def.value_type.clone(),
                output,
                input,
            };
            return reject(error.into());
        }

        let Some(raw) = self.data_branch_ids.allocate() else {
            return reject(GraphError::IdsExhausted("data branch"));
        };
        if let Some(previous) = self.data_branches.iter().position(|b| b.input == input) {
            debug!(input = %input, "replacing existing data branch");
            self.data_branches.remove(previous);
        }
        let id = DataBranchId(raw);
        self.data_branches.push(DataBranch { id, output, input });
        Ok(id)
    }

    pub fn disconnect_data_branch(&mut self, id: DataBranchId) -> bool {
        let before = self.data_branches.len();
        self.data_branches.retain(|branch| branch.id != id);
        let removed = before != self.data_branches.len();
        if !removed {
            warn!(branch = %id, "disconnect_data_branch: data branch not found");
        }
        removed
    }
}
