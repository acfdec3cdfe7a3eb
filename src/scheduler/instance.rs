use super::Runtime;
use crate::behaviour::context::Request;
use crate::behaviour::{Behaviour, BehaviourRegistry, StateBehaviour, TickPhase};
use crate::dataflow::DataStore;
use crate::error::{BehaviourError, InstanceError};
use crate::fsm::StateMachine;
use crate::graph::{NodeGraph, NodeId, NodeKind};
use crate::parameter::ParameterContainer;
use crate::tree::{TickEnv, TreeRunner, TreeState};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Identity of a live graph instance, unique within its [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Who drives an instance's passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Ticked by the [`Scheduler`](super::Scheduler) once per host pass.
    Autonomous,
    /// Ticked explicitly by a parent graph.
    Manual,
}

/// The per-instance state that behaviour hooks can reach through their context.
pub(crate) struct InstanceCore {
    pub(crate) id: InstanceId,
    pub(crate) asset: Option<String>,
    pub(crate) graph: Rc<NodeGraph>,
    pub(crate) parameters: ParameterContainer,
    pub(crate) data: DataStore,
    pub(crate) requests: VecDeque<Request>,
    pub(crate) play_state: PlayState,
    pub(crate) frame: u64,
}

impl InstanceCore {
    pub(crate) fn is_running(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.play_state = PlayState::Stopped;
        self.requests.clear();
    }
}

/// A live, playable instance of a [`NodeGraph`].
///
/// The graph itself is shared and never mutated at runtime; the instance owns the
/// behaviours built from it, a copy of its parameters and the slot values.
pub struct GraphInstance {
    core: InstanceCore,
    fsm: StateMachine,
    tree: Option<TreeRunner>,
    update_mode: UpdateMode,
}

impl GraphInstance {
    pub(crate) fn build(
        id: InstanceId,
        asset: Option<String>,
        graph: Rc<NodeGraph>,
        registry: &BehaviourRegistry,
    ) -> Result<Self, InstanceError> {
        let mut data = DataStore::from_graph(&graph);
        let mut states: AHashMap<NodeId, Vec<Box<dyn StateBehaviour>>> = AHashMap::new();
        let mut tree_behaviours = AHashMap::new();

        for node in graph.nodes() {
            for spec in node.behaviours() {
                let behaviour = registry.create(spec)?;
                match (node.kind(), behaviour) {
                    (NodeKind::State(_), Behaviour::State(state)) => {
                        states.entry(node.id()).or_default().push(state)
                    }
                    (NodeKind::Calculator, Behaviour::Calculator(calculator)) => {
                        data.insert_calculator(node.id(), calculator)
                    }
                    (kind, behaviour) if kind.is_tree_node() => {
                        tree_behaviours.insert(node.id(), behaviour);
                    }
                    (_, behaviour) => {
                        return Err(BehaviourError::InvalidConfig {
                            type_name: spec.type_name.clone(),
                            message: format!(
                                "node {} cannot host a {} behaviour",
                                node.id(),
                                behaviour.role()
                            ),
                        }
                        .into());
                    }
                }
            }
        }

        let fsm = StateMachine::new(&graph, states);
        let tree = TreeRunner::new(&graph, tree_behaviours)?;
        debug!(instance = %id, graph = graph.name(), "graph instance built");
        Ok(Self {
            core: InstanceCore {
                id,
                asset,
                parameters: graph.parameters().clone(),
                graph,
                data,
                requests: VecDeque::new(),
                play_state: PlayState::Stopped,
                frame: 0,
            },
            fsm,
            tree,
            update_mode: UpdateMode::Autonomous,
        })
    }

    pub fn id(&self) -> InstanceId {
        self.core.id
    }

    /// Name of the asset this instance was built from.
    pub fn asset(&self) -> Option<&str> {
        self.core.asset.as_deref()
    }

    pub fn graph(&self) -> &Rc<NodeGraph> {
        &self.core.graph
    }

    pub fn play_state(&self) -> PlayState {
        self.core.play_state
    }

    pub fn is_playing(&self) -> bool {
        self.core.is_running()
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.update_mode = mode;
    }

    /// Number of Update passes run so far.
    pub fn frame(&self) -> u64 {
        self.core.frame
    }

    pub fn parameters(&self) -> &ParameterContainer {
        &self.core.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterContainer {
        &mut self.core.parameters
    }

    /// Restores every parameter to the value defined on the graph.
    pub fn reset_parameters(&mut self) {
        self.core.parameters = self.core.graph.parameters().clone();
    }

    pub fn data(&self) -> &DataStore {
        &self.core.data
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.fsm
    }

    pub fn tree(&self) -> Option<&TreeRunner> {
        self.tree.as_ref()
    }

    pub fn current_state(&self) -> Option<NodeId> {
        self.fsm.current()
    }

    /// Starts the graph, or resumes it when paused.
    pub fn play(&mut self, runtime: &mut Runtime) {
        match self.core.play_state {
            PlayState::Playing => {}
            PlayState::Paused => self.resume(runtime),
            PlayState::Stopped => {
                debug!(instance = %self.core.id, "play");
                self.core.play_state = PlayState::Playing;
                self.core.requests.clear();
                if let Some(tree) = &mut self.tree {
                    tree.start();
                }
                self.fsm.start(&mut self.core, runtime);
                self.settle(runtime);
            }
        }
    }

    /// Ends every active state and tree node. Child graphs hosted by those nodes
    /// are stopped before this returns.
    pub fn stop(&mut self, runtime: &mut Runtime) {
        if self.core.play_state == PlayState::Stopped {
            return;
        }
        debug!(instance = %self.core.id, "stop");
        self.core.mark_stopped();
        self.fsm.stop(&mut self.core, runtime);
        self.stop_tree(runtime);
    }

    pub fn pause(&mut self, runtime: &mut Runtime) {
        if self.core.play_state != PlayState::Playing {
            return;
        }
        self.core.play_state = PlayState::Paused;
        self.fsm.pause(&mut self.core, runtime);
        let Self { core, fsm, tree, .. } = self;
        if let Some(tree) = tree {
            tree.pause(&mut TickEnv {
                core,
                runtime,
                fsm,
                phase: TickPhase::Update,
            });
        }
    }

    pub fn resume(&mut self, runtime: &mut Runtime) {
        if self.core.play_state != PlayState::Paused {
            return;
        }
        self.core.play_state = PlayState::Playing;
        self.fsm.resume(&mut self.core, runtime);
        let Self { core, fsm, tree, .. } = self;
        if let Some(tree) = tree {
            tree.resume(&mut TickEnv {
                core,
                runtime: &mut *runtime,
                fsm,
                phase: TickPhase::Update,
            });
        }
        self.settle(runtime);
    }

    /// Delivers a trigger synchronously to the active and resident states.
    pub fn send_trigger(&mut self, runtime: &mut Runtime, name: &str) {
        self.fsm.trigger(&mut self.core, runtime, name);
        self.settle(runtime);
    }

    pub fn execute_update(&mut self, runtime: &mut Runtime) {
        if !self.core.is_running() {
            return;
        }
        self.core.frame += 1;
        self.core.data.begin_pass();
        let tree_phase = self.core.graph.settings().tree_phase;
        let Self { core, fsm, tree, .. } = self;

        fsm.begin_update(core, runtime);
        fsm.update_residents(core, runtime, TickPhase::Update);
        if let Some(tree) = tree.as_mut() {
            let mut env = TickEnv {
                core: &mut *core,
                runtime: &mut *runtime,
                fsm: &mut *fsm,
                phase: TickPhase::Update,
            };
            if tree_phase == TickPhase::Update {
                tree.scan(&mut env);
            }
            tree.update_services(&mut env);
        }
        fsm.update_current(core, runtime, TickPhase::Update);
        if let Some(tree) = tree.as_mut() {
            if tree_phase == TickPhase::Update {
                tree.run(&mut TickEnv {
                    core,
                    runtime: &mut *runtime,
                    fsm,
                    phase: TickPhase::Update,
                });
            }
        }
        self.settle(runtime);
    }

    pub fn execute_fixed_update(&mut self, runtime: &mut Runtime) {
        self.execute_secondary(runtime, TickPhase::FixedUpdate);
    }

    /// Runs the LateUpdate pass and commits transitions deferred to its end.
    pub fn execute_late_update(&mut self, runtime: &mut Runtime) {
        self.execute_secondary(runtime, TickPhase::LateUpdate);
        if self.core.is_running() {
            self.fsm.end_late_update(&mut self.core, runtime);
            self.settle(runtime);
        }
    }

    fn execute_secondary(&mut self, runtime: &mut Runtime, phase: TickPhase) {
        if !self.core.is_running() {
            return;
        }
        self.core.data.begin_pass();
        let tree_phase = self.core.graph.settings().tree_phase;
        let Self { core, fsm, tree, .. } = self;

        fsm.update_residents(core, runtime, phase);
        if let Some(tree) = tree.as_mut() {
            let mut env = TickEnv {
                core: &mut *core,
                runtime: &mut *runtime,
                fsm: &mut *fsm,
                phase,
            };
            if tree_phase == phase {
                tree.scan(&mut env);
            }
            tree.update_services(&mut env);
        }
        fsm.update_current(core, runtime, phase);
        if let Some(tree) = tree.as_mut() {
            let mut env = TickEnv {
                core,
                runtime: &mut *runtime,
                fsm,
                phase,
            };
            if tree_phase == phase {
                tree.run(&mut env);
            } else {
                tree.update_leaf(&mut env);
            }
        }
        self.settle(runtime);
    }

    /// Brings the tree in line with the rest of the instance after a step: a
    /// stopped graph has no active tree nodes, and a graph made of a tree only
    /// stops once its tree finishes.
    fn settle(&mut self, runtime: &mut Runtime) {
        match self.core.play_state {
            PlayState::Stopped => self.stop_tree(runtime),
            PlayState::Playing => {
                let finished = self
                    .tree
                    .as_ref()
                    .is_some_and(|tree| matches!(tree.state(), TreeState::Finished(_)));
                if finished && self.fsm.is_empty() {
                    debug!(instance = %self.core.id, "behaviour tree finished, stopping graph");
                    self.stop(runtime);
                }
            }
            PlayState::Paused => {}
        }
    }

    fn stop_tree(&mut self, runtime: &mut Runtime) {
        let Self { core, fsm, tree, .. } = self;
        if let Some(tree) = tree {
            if tree.state() == TreeState::Running || !tree.active_path().is_empty() {
                tree.stop(&mut TickEnv {
                    core,
                    runtime,
                    fsm,
                    phase: TickPhase::Update,
                });
            }
        }
    }
}

impl fmt::Debug for GraphInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphInstance")
            .field("id", &self.core.id)
            .field("asset", &self.core.asset)
            .field("play_state", &self.core.play_state)
            .field("update_mode", &self.update_mode)
            .field("current_state", &self.fsm.current())
            .finish()
    }
}
