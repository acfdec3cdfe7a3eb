use crate::behaviour::{
    ActionBehaviour, Behaviour, CompositeBehaviour, CompositeStep, DecoratorBehaviour,
    NodeContext, ServiceBehaviour, Status, TickPhase,
};
use crate::error::BehaviourError;
use crate::fsm::StateMachine;
use crate::graph::{NodeGraph, NodeId, NodeKind};
use crate::scheduler::{InstanceCore, Runtime};
use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

/// Upper bound on enter/finish steps in one tick.
const MAX_STEPS: usize = 1024;

/// Where the runner is in its traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    Idle,
    Running,
    Finished(Status),
}

/// Everything a tree hook needs besides the tree itself.
pub(crate) struct TickEnv<'a> {
    pub(crate) core: &'a mut InstanceCore,
    pub(crate) runtime: &'a mut Runtime,
    pub(crate) fsm: &'a mut StateMachine,
    pub(crate) phase: TickPhase,
}

impl TickEnv<'_> {
    /// Runs one hook, then processes whatever it requested.
    fn hook<R>(&mut self, node: NodeId, f: impl FnOnce(&mut NodeContext<'_>) -> R) -> R {
        let result = {
            let mut ctx = NodeContext::new(node, 0, self.phase, &mut *self.core, &mut *self.runtime);
            f(&mut ctx)
        };
        self.fsm.drain(self.core, self.runtime);
        result
    }
}

enum TreeBehaviour {
    None,
    Composite(Box<dyn CompositeBehaviour>),
    Decorator(Box<dyn DecoratorBehaviour>),
    Action(Box<dyn ActionBehaviour>),
}

struct TreeNode {
    behaviour: TreeBehaviour,
    children: Vec<NodeId>,
    services: Vec<NodeId>,
    parent: Option<(NodeId, usize)>,
    current_child: usize,
    started: bool,
    last_condition: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
enum Flow {
    Enter(NodeId),
    Execute(NodeId),
    Finish(NodeId, Status),
}

/// Runtime of the behaviour tree of one graph instance.
///
/// The active path runs from the root's child down to the running leaf. Each
/// tick the runner first scans the path for aborts, top-down, then resumes
/// execution at the leaf. Statuses propagate upwards through the composites and
/// decorators until one of them asks for another child or the root is reached.
pub struct TreeRunner {
    root: NodeId,
    nodes: AHashMap<NodeId, TreeNode>,
    services: AHashMap<NodeId, Box<dyn ServiceBehaviour>>,
    path: Vec<NodeId>,
    state: TreeState,
    executed: AHashSet<NodeId>,
    flow: Option<Flow>,
    last_status: Option<Status>,
}

impl TreeRunner {
    /// Builds the runner for `graph`, taking each tree node's behaviour from
    /// `behaviours`. Returns `None` when the graph has no root.
    pub(crate) fn new(
        graph: &NodeGraph,
        mut behaviours: AHashMap<NodeId, Behaviour>,
    ) -> Result<Option<Self>, BehaviourError> {
        let Some(root) = graph.root() else {
            return Ok(None);
        };

        let mut nodes = AHashMap::new();
        let mut services = AHashMap::new();
        for node in graph.nodes().iter().filter(|n| n.kind().is_tree_node()) {
            let id = node.id();
            let behaviour = behaviours.remove(&id);
            if matches!(node.kind(), NodeKind::Service) {
                match behaviour {
                    Some(Behaviour::Service(service)) => {
                        services.insert(id, service);
                    }
                    Some(other) => return Err(role_mismatch(node.kind(), &other)),
                    None => warn!(node = %id, "service node has no behaviour"),
                }
                continue;
            }

            let behaviour = match (node.kind(), behaviour) {
                (_, None) => {
                    if !matches!(node.kind(), NodeKind::Root) {
                        warn!(node = %id, "tree node has no behaviour");
                    }
                    TreeBehaviour::None
                }
                (NodeKind::Composite, Some(Behaviour::Composite(b))) => TreeBehaviour::Composite(b),
                (NodeKind::Decorator, Some(Behaviour::Decorator(b))) => TreeBehaviour::Decorator(b),
                (NodeKind::Action, Some(Behaviour::Action(b))) => TreeBehaviour::Action(b),
                (kind, Some(other)) => return Err(role_mismatch(kind, &other)),
            };
            let parent = graph.parent_of(id).and_then(|parent| {
                let index = graph.children(parent).iter().position(|c| *c == id)?;
                Some((parent, index))
            });
            nodes.insert(
                id,
                TreeNode {
                    behaviour,
                    children: graph.children(id),
                    services: graph.services(id),
                    parent,
                    current_child: 0,
                    started: false,
                    last_condition: None,
                },
            );
        }

        Ok(Some(Self {
            root,
            nodes,
            services,
            path: Vec::new(),
            state: TreeState::Idle,
            executed: AHashSet::new(),
            flow: None,
            last_status: None,
        }))
    }

    pub fn state(&self) -> TreeState {
        self.state
    }

    /// Active nodes from the root's child down to the running leaf.
    pub fn active_path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    /// Status of the last completed run of the whole tree since the graph
    /// started playing.
    pub fn last_status(&self) -> Option<Status> {
        self.last_status
    }

    /// Status the tree currently reports: `Executing` while running.
    pub fn status(&self) -> Option<Status> {
        match self.state {
            TreeState::Idle => None,
            TreeState::Running => Some(Status::Executing),
            TreeState::Finished(status) => Some(status),
        }
    }

    pub(crate) fn start(&mut self) {
        self.path.clear();
        self.flow = None;
        self.executed.clear();
        self.last_status = None;
        for node in self.nodes.values_mut() {
            node.current_child = 0;
            node.started = false;
            node.last_condition = None;
        }
        self.state = TreeState::Running;
    }

    /// Exits every active node, deepest first.
    pub(crate) fn stop(&mut self, env: &mut TickEnv<'_>) {
        self.exit_below(env, 0);
        self.flow = None;
        self.state = TreeState::Idle;
    }

    /// Opens a tree pass: resets the per-tick execution record and scans the
    /// active path for aborts.
    pub(crate) fn scan(&mut self, env: &mut TickEnv<'_>) {
        self.executed.clear();
        if self.state != TreeState::Running {
            return;
        }
        if self.path.is_empty() {
            let first = self.nodes.get(&self.root).and_then(|r| r.children.first().copied());
            match first {
                Some(child) => self.flow = Some(Flow::Enter(child)),
                None => self.root_finished(env, Status::Success),
            }
            return;
        }
        if self.flow.is_none() {
            self.flow = self.abort_scan(env);
        }
    }

    fn abort_scan(&mut self, env: &mut TickEnv<'_>) -> Option<Flow> {
        for depth in 0..self.path.len() {
            let node = self.path[depth];

            if self.decorator_flags(node).is_some_and(|(flags, _)| flags.aborts_self()) {
                let condition = self.check_condition(env, node);
                if !env.core.is_running() {
                    return None;
                }
                if !condition {
                    debug!(node = %node, "self abort");
                    self.exit_below(env, depth + 1);
                    return Some(Flow::Finish(node, Status::Failure));
                }
            }

            let Some(tree_node) = self.nodes.get(&node) else {
                continue;
            };
            if !matches!(tree_node.behaviour, TreeBehaviour::Composite(_) | TreeBehaviour::None) {
                continue;
            }
            let higher: Vec<(usize, NodeId)> = tree_node
                .children
                .iter()
                .copied()
                .enumerate()
                .take(tree_node.current_child)
                .collect();
            for (index, sibling) in higher {
                let Some((flags, sense)) = self.decorator_flags(sibling) else {
                    continue;
                };
                if !flags.aborts_lower_priority() {
                    continue;
                }
                let previous = self.nodes.get(&sibling).and_then(|n| n.last_condition);
                let condition = self.check_condition(env, sibling);
                if !env.core.is_running() {
                    return None;
                }
                if previous.is_some_and(|previous| sense.fires(previous, condition)) {
                    debug!(decorator = %sibling, "lower priority abort");
                    self.exit_below(env, depth + 1);
                    if let Some(parent) = self.nodes.get_mut(&node) {
                        parent.current_child = index;
                        if let TreeBehaviour::Composite(composite) = &mut parent.behaviour {
                            env.hook(node, |ctx| composite.on_interrupt(ctx, index));
                        }
                    }
                    return Some(Flow::Enter(sibling));
                }
            }
        }
        None
    }

    fn decorator_flags(
        &self,
        node: NodeId,
    ) -> Option<(crate::behaviour::AbortFlags, crate::behaviour::AbortSense)> {
        match &self.nodes.get(&node)?.behaviour {
            TreeBehaviour::Decorator(decorator) => {
                Some((decorator.abort_flags(), decorator.abort_sense()))
            }
            _ => None,
        }
    }

    fn check_condition(&mut self, env: &mut TickEnv<'_>, node: NodeId) -> bool {
        let Some(tree_node) = self.nodes.get_mut(&node) else {
            return false;
        };
        let condition = match &mut tree_node.behaviour {
            TreeBehaviour::Decorator(decorator) => {
                env.hook(node, |ctx| decorator.on_condition_check(ctx))
            }
            _ => true,
        };
        if let Some(tree_node) = self.nodes.get_mut(&node) {
            tree_node.last_condition = Some(condition);
        }
        condition
    }

    /// Runs the services on the active path whose phase matches the pass.
    pub(crate) fn update_services(&mut self, env: &mut TickEnv<'_>) {
        let owners = self.path.clone();
        for owner in owners {
            if !env.core.is_running() {
                return;
            }
            let services = self
                .nodes
                .get(&owner)
                .map(|n| n.services.clone())
                .unwrap_or_default();
            for id in services {
                if let Some(service) = self.services.get_mut(&id) {
                    if service.phase() == env.phase {
                        env.hook(id, |ctx| service.on_update(ctx));
                    }
                }
            }
        }
    }

    /// Calls the running action's per-pass hook outside the tree pass.
    pub(crate) fn update_leaf(&mut self, env: &mut TickEnv<'_>) {
        let Some(&leaf) = self.path.last() else {
            return;
        };
        let Some(TreeNode {
            behaviour: TreeBehaviour::Action(action),
            started: true,
            ..
        }) = self.nodes.get_mut(&leaf)
        else {
            return;
        };
        match env.phase {
            TickPhase::FixedUpdate => env.hook(leaf, |ctx| action.on_fixed_update(ctx)),
            TickPhase::LateUpdate => env.hook(leaf, |ctx| action.on_late_update(ctx)),
            TickPhase::Update => {}
        }
    }

    pub(crate) fn pause(&mut self, env: &mut TickEnv<'_>) {
        if let Some((leaf, action)) = self.running_action() {
            env.hook(leaf, |ctx| action.on_graph_pause(ctx));
        }
    }

    pub(crate) fn resume(&mut self, env: &mut TickEnv<'_>) {
        if let Some((leaf, action)) = self.running_action() {
            env.hook(leaf, |ctx| action.on_graph_resume(ctx));
        }
    }

    fn running_action(&mut self) -> Option<(NodeId, &mut Box<dyn ActionBehaviour>)> {
        let leaf = *self.path.last()?;
        match self.nodes.get_mut(&leaf)? {
            TreeNode {
                behaviour: TreeBehaviour::Action(action),
                started: true,
                ..
            } => Some((leaf, action)),
            _ => None,
        }
    }

    /// Resumes traversal: continues a flow left by the abort scan, or executes
    /// the running leaf. Stops when a leaf reports `Executing`, when a leaf that
    /// already ran this tick is reached, or when the root finishes.
    pub(crate) fn run(&mut self, env: &mut TickEnv<'_>) {
        if self.state != TreeState::Running {
            return;
        }
        let next = self
            .flow
            .take()
            .or_else(|| self.path.last().map(|&leaf| Flow::Execute(leaf)));
        let Some(mut flow) = next else {
            return;
        };

        for _ in 0..MAX_STEPS {
            if !env.core.is_running() || self.state != TreeState::Running {
                return;
            }
            flow = match flow {
                Flow::Enter(node) => self.enter(env, node),
                Flow::Execute(node) => {
                    if self.executed.contains(&node) {
                        return;
                    }
                    match self.execute(env, node) {
                        Status::Executing => return,
                        status => Flow::Finish(node, status),
                    }
                }
                Flow::Finish(node, status) => match self.finish(env, node, status) {
                    Some(next) => next,
                    None => return,
                },
            };
        }
        warn!("behaviour tree step limit reached, resuming next tick");
        self.flow = Some(flow);
    }

    fn enter(&mut self, env: &mut TickEnv<'_>, node: NodeId) -> Flow {
        let Some(tree_node) = self.nodes.get_mut(&node) else {
            warn!(node = %node, "entering unknown tree node");
            return Flow::Finish(node, Status::Failure);
        };
        self.path.push(node);
        let count = tree_node.children.len();

        let flow = match &mut tree_node.behaviour {
            TreeBehaviour::Decorator(decorator) => {
                let condition = env.hook(node, |ctx| decorator.on_condition_check(ctx));
                tree_node.last_condition = Some(condition);
                if !condition {
                    return Flow::Finish(node, Status::Failure);
                }
                env.hook(node, |ctx| decorator.on_start(ctx));
                tree_node.started = true;
                match tree_node.children.first() {
                    Some(&child) => Flow::Enter(child),
                    None => Flow::Finish(node, Status::Success),
                }
            }
            TreeBehaviour::Composite(composite) => {
                env.hook(node, |ctx| composite.on_start(ctx));
                tree_node.started = true;
                let step = env.hook(node, |ctx| composite.first_child(ctx, count));
                Self::step_flow(tree_node, node, step)
            }
            TreeBehaviour::Action(action) => {
                env.hook(node, |ctx| action.on_start(ctx));
                tree_node.started = true;
                Flow::Execute(node)
            }
            TreeBehaviour::None => {
                tree_node.started = true;
                match tree_node.children.first() {
                    Some(&child) => Flow::Enter(child),
                    None => Flow::Finish(node, Status::Success),
                }
            }
        };

        let services = self
            .nodes
            .get(&node)
            .map(|n| n.services.clone())
            .unwrap_or_default();
        for id in services {
            if let Some(service) = self.services.get_mut(&id) {
                env.hook(id, |ctx| service.on_start(ctx));
            }
        }
        flow
    }

    fn step_flow(tree_node: &mut TreeNode, node: NodeId, step: CompositeStep) -> Flow {
        match step {
            CompositeStep::Run(index) => match tree_node.children.get(index) {
                Some(&child) => {
                    tree_node.current_child = index;
                    Flow::Enter(child)
                }
                None => {
                    warn!(node = %node, index, "composite asked for a child it does not have");
                    Flow::Finish(node, Status::Failure)
                }
            },
            CompositeStep::Finish(status) => Flow::Finish(node, status),
        }
    }

    fn execute(&mut self, env: &mut TickEnv<'_>, node: NodeId) -> Status {
        self.executed.insert(node);
        match self.nodes.get_mut(&node).map(|n| &mut n.behaviour) {
            Some(TreeBehaviour::Action(action)) => env.hook(node, |ctx| action.on_execute(ctx)),
            _ => Status::Success,
        }
    }

    fn finish(&mut self, env: &mut TickEnv<'_>, node: NodeId, status: Status) -> Option<Flow> {
        if let Some(depth) = self.path.iter().position(|n| *n == node) {
            self.exit_below(env, depth);
        }
        let (parent, index) = self.nodes.get(&node)?.parent?;
        if parent == self.root {
            self.root_finished(env, status);
            return None;
        }

        let parent_node = self.nodes.get_mut(&parent)?;
        let count = parent_node.children.len();
        let flow = match &mut parent_node.behaviour {
            TreeBehaviour::Composite(composite) => {
                let step = env.hook(parent, |ctx| composite.next_child(ctx, index, status, count));
                Self::step_flow(parent_node, parent, step)
            }
            TreeBehaviour::Decorator(decorator) => {
                match env.hook(parent, |ctx| decorator.on_child_finished(ctx, status)) {
                    Status::Executing => Flow::Enter(node),
                    result => Flow::Finish(parent, result),
                }
            }
            _ => Flow::Finish(parent, status),
        };
        Some(flow)
    }

    fn root_finished(&mut self, env: &mut TickEnv<'_>, status: Status) {
        debug!(status = %status, "behaviour tree finished");
        self.last_status = Some(status);
        self.exit_below(env, 0);
        if env.core.graph.settings().restart_on_finish {
            self.state = TreeState::Running;
        } else {
            self.state = TreeState::Finished(status);
        }
    }

    /// Exits the active path entries at `depth` and below, deepest first.
    fn exit_below(&mut self, env: &mut TickEnv<'_>, depth: usize) {
        while self.path.len() > depth {
            let Some(node) = self.path.pop() else {
                break;
            };
            self.exit(env, node);
        }
    }

    fn exit(&mut self, env: &mut TickEnv<'_>, node: NodeId) {
        let Some(tree_node) = self.nodes.get_mut(&node) else {
            return;
        };
        // Services start with their owner, so an owner that never started has none running.
        if !std::mem::replace(&mut tree_node.started, false) {
            return;
        }
        let services = tree_node.services.clone();
        for id in services.into_iter().rev() {
            if let Some(service) = self.services.get_mut(&id) {
                env.hook(id, |ctx| service.on_end(ctx));
            }
        }
        let Some(tree_node) = self.nodes.get_mut(&node) else {
            return;
        };
        match &mut tree_node.behaviour {
            TreeBehaviour::Composite(composite) => env.hook(node, |ctx| composite.on_end(ctx)),
            TreeBehaviour::Decorator(decorator) => env.hook(node, |ctx| decorator.on_end(ctx)),
            TreeBehaviour::Action(action) => env.hook(node, |ctx| action.on_end(ctx)),
            TreeBehaviour::None => {}
        }
    }
}

fn role_mismatch(kind: &NodeKind, behaviour: &Behaviour) -> BehaviourError {
    BehaviourError::InvalidConfig {
        type_name: behaviour.role().to_string(),
        message: format!("a {:?} node cannot host a {} behaviour", kind, behaviour.role()),
    }
}
