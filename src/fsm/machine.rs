use crate::behaviour::context::Request;
use crate::behaviour::{NodeContext, StateBehaviour, TickPhase};
use crate::graph::{NodeGraph, NodeId, StateLink, TransitionTiming};
use crate::scheduler::{InstanceCore, Runtime};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Triggers sent from trigger handlers nest; deeper chains are dropped.
const MAX_TRIGGER_DEPTH: usize = 32;

/// Lifecycle phase of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatePhase {
    Stopped,
    Entering,
    Active,
    Exiting,
    ResidentActive,
}

#[derive(Clone, Copy)]
enum Hook<'n> {
    Awake,
    Begin,
    Update,
    FixedUpdate,
    LateUpdate,
    End,
    Pause,
    Resume,
    Trigger(&'n str),
}

impl Hook<'_> {
    fn call(self, behaviour: &mut dyn StateBehaviour, ctx: &mut NodeContext<'_>) {
        match self {
            Hook::Awake => behaviour.on_awake(ctx),
            Hook::Begin => behaviour.on_begin(ctx),
            Hook::Update => behaviour.on_update(ctx),
            Hook::FixedUpdate => behaviour.on_fixed_update(ctx),
            Hook::LateUpdate => behaviour.on_late_update(ctx),
            Hook::End => behaviour.on_end(ctx),
            Hook::Pause => behaviour.on_graph_pause(ctx),
            Hook::Resume => behaviour.on_graph_resume(ctx),
            Hook::Trigger(name) => behaviour.on_trigger(ctx, name),
        }
    }

    fn phase(self) -> TickPhase {
        match self {
            Hook::FixedUpdate => TickPhase::FixedUpdate,
            Hook::LateUpdate => TickPhase::LateUpdate,
            _ => TickPhase::Update,
        }
    }

    /// Hooks that stop iterating once their state is no longer the running one.
    fn interruptible(self) -> bool {
        matches!(
            self,
            Hook::Begin | Hook::Update | Hook::FixedUpdate | Hook::LateUpdate | Hook::Trigger(_)
        )
    }
}

impl From<TickPhase> for Hook<'_> {
    fn from(phase: TickPhase) -> Self {
        match phase {
            TickPhase::Update => Hook::Update,
            TickPhase::FixedUpdate => Hook::FixedUpdate,
            TickPhase::LateUpdate => Hook::LateUpdate,
        }
    }
}

/// Runtime of the states of one graph instance.
///
/// Exactly one transient state is current at a time; resident states run
/// alongside it. At most one transition is accepted per window. A window opens at
/// the start of every Update pass and again after the end-of-LateUpdate commit.
pub struct StateMachine {
    behaviours: AHashMap<NodeId, Vec<Box<dyn StateBehaviour>>>,
    order: Vec<NodeId>,
    residents: Vec<NodeId>,
    start: Option<NodeId>,
    current: Option<NodeId>,
    phase: StatePhase,
    residents_running: bool,
    pending: Option<StateLink>,
    locked: bool,
    awake: bool,
    trigger_depth: usize,
    commits: u64,
}

impl StateMachine {
    pub(crate) fn new(
        graph: &NodeGraph,
        mut behaviours: AHashMap<NodeId, Vec<Box<dyn StateBehaviour>>>,
    ) -> Self {
        let mut order = Vec::new();
        let mut residents = Vec::new();
        for state in graph.states() {
            behaviours.entry(state.id()).or_default();
            order.push(state.id());
            if state.is_resident() {
                residents.push(state.id());
            }
        }
        Self {
            behaviours,
            order,
            residents,
            start: graph.start_state(),
            current: None,
            phase: StatePhase::Stopped,
            residents_running: false,
            pending: None,
            locked: false,
            awake: false,
            trigger_depth: 0,
            commits: 0,
        }
    }

    /// Whether the graph has any state at all.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The current transient state.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn residents(&self) -> &[NodeId] {
        &self.residents
    }

    pub fn phase_of(&self, state: NodeId) -> StatePhase {
        if self.residents_running && self.residents.contains(&state) {
            StatePhase::ResidentActive
        } else if self.current == Some(state) {
            self.phase
        } else {
            StatePhase::Stopped
        }
    }

    /// The accepted transition waiting for its commit point, if any.
    pub fn pending(&self) -> Option<&StateLink> {
        self.pending.as_ref()
    }

    /// Number of transitions committed since the instance was created.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    fn is_active(&self, state: NodeId) -> bool {
        (self.current == Some(state) && matches!(self.phase, StatePhase::Entering | StatePhase::Active))
            || (self.residents_running && self.residents.contains(&state))
    }

    fn run(&mut self, core: &mut InstanceCore, runtime: &mut Runtime, state: NodeId, hook: Hook<'_>) {
        let count = self.behaviours.get(&state).map_or(0, Vec::len);
        let transient = !self.residents.contains(&state);
        for index in 0..count {
            if hook.interruptible()
                && (!core.is_running() || (transient && self.current != Some(state)))
            {
                break;
            }
            {
                let Some(behaviour) = self.behaviours.get_mut(&state).and_then(|b| b.get_mut(index))
                else {
                    break;
                };
                let mut ctx = NodeContext::new(state, index, hook.phase(), core, runtime);
                hook.call(behaviour.as_mut(), &mut ctx);
            }
            self.drain(core, runtime);
        }
    }

    /// Processes the requests queued by the hook that just returned.
    pub(crate) fn drain(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        while let Some(request) = core.requests.pop_front() {
            match request {
                Request::Transition { from, link } => {
                    self.request_transition(core, runtime, from, &link)
                }
                Request::Trigger { name } => self.trigger(core, runtime, &name),
            }
        }
    }

    fn request_transition(
        &mut self,
        core: &mut InstanceCore,
        runtime: &mut Runtime,
        from: NodeId,
        name: &str,
    ) {
        if !core.is_running() || !self.is_active(from) {
            debug!(state = %from, link = name, "transition from an inactive state ignored");
            return;
        }
        let Some(link) = core.graph.link(from, name).cloned() else {
            warn!(state = %from, link = name, "transition link not found");
            return;
        };
        if let Some(target) = link.target {
            let valid = core
                .graph
                .node(target)
                .is_some_and(|node| node.kind().is_state() && !node.is_resident());
            if !valid {
                warn!(state = %from, link = name, target = %target, "transition target is missing or not a transient state");
                return;
            }
        }
        if self.locked {
            debug!(state = %from, link = name, "transition ignored, one was already accepted");
            return;
        }
        self.locked = true;
        debug!(state = %from, link = name, timing = ?link.timing, "transition accepted");
        match link.timing {
            TransitionTiming::Immediate => self.commit(core, runtime, link.target),
            TransitionTiming::LateUpdate | TransitionTiming::NextUpdate => {
                self.pending = Some(link)
            }
        }
    }

    fn commit(&mut self, core: &mut InstanceCore, runtime: &mut Runtime, target: Option<NodeId>) {
        self.commits += 1;
        let Some(target) = target else {
            debug!("terminal link taken, stopping graph");
            core.mark_stopped();
            self.stop(core, runtime);
            return;
        };

        if let Some(old) = self.current {
            self.phase = StatePhase::Exiting;
            self.run(core, runtime, old, Hook::End);
            debug!(from = %old, to = %target, "state transition committed");
        }
        if !core.is_running() {
            return;
        }
        self.current = Some(target);
        self.phase = StatePhase::Entering;
        self.run(core, runtime, target, Hook::Begin);
        if self.current == Some(target) && self.phase == StatePhase::Entering {
            self.phase = StatePhase::Active;
        }
    }

    /// Starts the residents and the start state.
    pub(crate) fn start(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        if !self.awake {
            self.awake = true;
            for i in 0..self.order.len() {
                let state = self.order[i];
                self.run(core, runtime, state, Hook::Awake);
            }
        }
        self.pending = None;
        self.locked = false;

        self.residents_running = true;
        for i in 0..self.residents.len() {
            let resident = self.residents[i];
            self.run(core, runtime, resident, Hook::Begin);
        }

        if self.current.is_none() {
            if let Some(start) = self.start {
                self.current = Some(start);
                self.phase = StatePhase::Entering;
                self.run(core, runtime, start, Hook::Begin);
                if self.current == Some(start) && self.phase == StatePhase::Entering {
                    self.phase = StatePhase::Active;
                }
            }
        }
    }

    /// Ends the current state and the residents.
    pub(crate) fn stop(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        self.pending = None;
        self.locked = false;
        if let Some(current) = self.current {
            if self.phase != StatePhase::Exiting {
                self.phase = StatePhase::Exiting;
                self.run(core, runtime, current, Hook::End);
            }
            self.current = None;
            self.phase = StatePhase::Stopped;
        }
        if self.residents_running {
            self.residents_running = false;
            for i in 0..self.residents.len() {
                let resident = self.residents[i];
                self.run(core, runtime, resident, Hook::End);
            }
        }
    }

    /// Step one of an Update pass: commit what an earlier pass deferred, then
    /// open a new transition window.
    pub(crate) fn begin_update(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        if let Some(link) = self.pending.take() {
            self.commit(core, runtime, link.target);
        }
        self.open_window();
    }

    /// Last step of a LateUpdate pass.
    pub(crate) fn end_late_update(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        if self
            .pending
            .as_ref()
            .is_some_and(|link| link.timing == TransitionTiming::LateUpdate)
        {
            if let Some(link) = self.pending.take() {
                self.commit(core, runtime, link.target);
            }
        }
        self.open_window();
    }

    fn open_window(&mut self) {
        if self.pending.is_none() {
            self.locked = false;
        }
    }

    pub(crate) fn update_residents(
        &mut self,
        core: &mut InstanceCore,
        runtime: &mut Runtime,
        phase: TickPhase,
    ) {
        if !self.residents_running {
            return;
        }
        for i in 0..self.residents.len() {
            let resident = self.residents[i];
            self.run(core, runtime, resident, phase.into());
        }
    }

    pub(crate) fn update_current(
        &mut self,
        core: &mut InstanceCore,
        runtime: &mut Runtime,
        phase: TickPhase,
    ) {
        if let Some(current) = self.current {
            if self.phase == StatePhase::Active {
                self.run(core, runtime, current, phase.into());
            }
        }
    }

    /// Delivers a trigger to the residents, then to the current state.
    pub(crate) fn trigger(&mut self, core: &mut InstanceCore, runtime: &mut Runtime, name: &str) {
        if !core.is_running() {
            debug!(trigger = name, "trigger dropped, graph is not running");
            return;
        }
        if self.trigger_depth >= MAX_TRIGGER_DEPTH {
            warn!(trigger = name, "trigger chain too deep, dropping trigger");
            return;
        }
        self.trigger_depth += 1;
        if self.residents_running {
            for i in 0..self.residents.len() {
                let resident = self.residents[i];
                self.run(core, runtime, resident, Hook::Trigger(name));
            }
        }
        if let Some(current) = self.current {
            if self.is_active(current) {
                self.run(core, runtime, current, Hook::Trigger(name));
            }
        }
        self.trigger_depth -= 1;
    }

    pub(crate) fn pause(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        self.broadcast(core, runtime, Hook::Pause);
    }

    pub(crate) fn resume(&mut self, core: &mut InstanceCore, runtime: &mut Runtime) {
        self.broadcast(core, runtime, Hook::Resume);
    }

    fn broadcast(&mut self, core: &mut InstanceCore, runtime: &mut Runtime, hook: Hook<'_>) {
        if self.residents_running {
            for i in 0..self.residents.len() {
                let resident = self.residents[i];
                self.run(core, runtime, resident, hook);
            }
        }
        if let Some(current) = self.current {
            self.run(core, runtime, current, hook);
        }
    }
}
