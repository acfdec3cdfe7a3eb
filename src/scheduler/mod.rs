//! Per-tick orchestration of graph instances.
//!
//! The host calls [`Scheduler::execute_update`], [`Scheduler::execute_fixed_update`]
//! and [`Scheduler::execute_late_update`] once per frame. Each autonomous instance
//! then runs its pass in a fixed order:
//!
//! 1. commit a transition deferred by an earlier pass,
//! 2. resident states, then the tree's abort scan and services,
//! 3. the current state, then the tree's leaves,
//! 4. (LateUpdate only) commit transitions deferred to the end of LateUpdate.
//!
//! Triggers and transition requests are handled as soon as the hook that made
//! them returns. Instances in [`UpdateMode::Manual`] are skipped; their parent
//! drives them.

pub mod instance;
pub mod runtime;

pub(crate) use instance::InstanceCore;
pub use instance::{GraphInstance, InstanceId, PlayState, UpdateMode};
pub use runtime::{MAX_NESTING, Runtime};

use crate::behaviour::{BehaviourFactory, BehaviourRegistry};
use crate::clock::Clock;
use crate::error::InstanceError;
use crate::graph::NodeGraph;
use crate::parameter::ParameterContainer;
use std::rc::Rc;
use tracing::debug;

/// Owns the [`Runtime`] and the autonomous graph instances.
pub struct Scheduler {
    runtime: Runtime,
    instances: Vec<Box<GraphInstance>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Runtime::default())
    }
}

impl Scheduler {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            instances: Vec::new(),
        }
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// Instantiates a registered asset as an autonomous instance. The instance
    /// starts playing right away unless its graph settings say otherwise.
    pub fn spawn(&mut self, asset: &str) -> Result<InstanceId, InstanceError> {
        let instance = self.runtime.instantiate(asset)?;
        Ok(self.adopt(instance))
    }

    /// Instantiates an unregistered graph as an autonomous instance.
    pub fn spawn_graph(&mut self, graph: NodeGraph) -> Result<InstanceId, InstanceError> {
        let instance = self.runtime.instantiate_graph(Rc::new(graph))?;
        Ok(self.adopt(instance))
    }

    fn adopt(&mut self, mut instance: GraphInstance) -> InstanceId {
        let id = instance.id();
        instance.set_update_mode(UpdateMode::Autonomous);
        if instance.graph().settings().play_on_start {
            instance.play(&mut self.runtime);
        }
        debug!(instance = %id, "instance spawned");
        self.instances.push(Box::new(instance));
        id
    }

    /// Stops and removes an instance.
    pub fn despawn(&mut self, id: InstanceId) -> bool {
        let Some(index) = self.instances.iter().position(|i| i.id() == id) else {
            return false;
        };
        let mut instance = self.instances.remove(index);
        instance.stop(&mut self.runtime);
        true
    }

    pub fn instance(&self, id: InstanceId) -> Option<&GraphInstance> {
        self.instances.iter().find(|i| i.id() == id).map(Box::as_ref)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut GraphInstance> {
        self.instances
            .iter_mut()
            .find(|i| i.id() == id)
            .map(Box::as_mut)
    }

    pub fn instances(&self) -> impl Iterator<Item = &GraphInstance> {
        self.instances.iter().map(Box::as_ref)
    }

    fn with_instance(
        &mut self,
        id: InstanceId,
        f: impl FnOnce(&mut GraphInstance, &mut Runtime),
    ) -> Result<(), InstanceError> {
        let instance = self
            .instances
            .iter_mut()
            .find(|i| i.id() == id)
            .ok_or(InstanceError::InstanceNotFound(id.raw()))?;
        f(instance, &mut self.runtime);
        Ok(())
    }

    pub fn play(&mut self, id: InstanceId) -> Result<(), InstanceError> {
        self.with_instance(id, |instance, runtime| instance.play(runtime))
    }

    pub fn stop(&mut self, id: InstanceId) -> Result<(), InstanceError> {
        self.with_instance(id, |instance, runtime| instance.stop(runtime))
    }

    pub fn pause(&mut self, id: InstanceId) -> Result<(), InstanceError> {
        self.with_instance(id, |instance, runtime| instance.pause(runtime))
    }

    pub fn resume(&mut self, id: InstanceId) -> Result<(), InstanceError> {
        self.with_instance(id, |instance, runtime| instance.resume(runtime))
    }

    /// Delivers a trigger to one instance, synchronously.
    pub fn send_trigger(&mut self, id: InstanceId, name: &str) -> Result<(), InstanceError> {
        self.with_instance(id, |instance, runtime| instance.send_trigger(runtime, name))
    }

    /// Delivers a trigger to every autonomous instance. Manual instances only
    /// receive triggers sent to them directly.
    pub fn broadcast_trigger(&mut self, name: &str) {
        for instance in &mut self.instances {
            if instance.update_mode() == UpdateMode::Autonomous {
                instance.send_trigger(&mut self.runtime, name);
            }
        }
    }

    /// Advances frame time by `dt` seconds and runs the Update pass.
    pub fn execute_update(&mut self, dt: f64) {
        self.runtime.clock_mut().advance(dt);
        for instance in &mut self.instances {
            if instance.update_mode() == UpdateMode::Autonomous {
                instance.execute_update(&mut self.runtime);
            }
        }
    }

    /// Advances fixed time by `dt` seconds and runs the FixedUpdate pass.
    pub fn execute_fixed_update(&mut self, dt: f64) {
        self.runtime.clock_mut().advance_fixed(dt);
        for instance in &mut self.instances {
            if instance.update_mode() == UpdateMode::Autonomous {
                instance.execute_fixed_update(&mut self.runtime);
            }
        }
    }

    pub fn execute_late_update(&mut self) {
        for instance in &mut self.instances {
            if instance.update_mode() == UpdateMode::Autonomous {
                instance.execute_late_update(&mut self.runtime);
            }
        }
    }

    /// One full frame: Update followed by LateUpdate.
    pub fn advance(&mut self, dt: f64) {
        self.execute_update(dt);
        self.execute_late_update();
    }
}

/// Assembles a [`Scheduler`] and its [`Runtime`].
pub struct SchedulerBuilder {
    registry: BehaviourRegistry,
    assets: Vec<(String, NodeGraph)>,
    shared: Vec<(String, ParameterContainer)>,
    clock: Clock,
    pool_capacity: Option<usize>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// A builder whose registry holds the built-in behaviours.
    pub fn new() -> Self {
        Self {
            registry: BehaviourRegistry::with_builtins(),
            assets: Vec::new(),
            shared: Vec::new(),
            clock: Clock::default(),
            pool_capacity: None,
        }
    }

    pub fn with_registry(mut self, registry: BehaviourRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_behaviour(mut self, type_name: &str, factory: impl BehaviourFactory + 'static) -> Self {
        self.registry.register(type_name, factory);
        self
    }

    /// Makes a built-in behaviour available under another type name.
    pub fn with_type_alias(mut self, user_type_name: &str, builtin_type_name: &str) -> Self {
        if let Some(factory) = crate::builtin::create_factory_by_name(builtin_type_name) {
            self.registry.register(user_type_name, factory);
        }
        self
    }

    pub fn with_asset(mut self, name: &str, graph: NodeGraph) -> Self {
        self.assets.push((name.to_string(), graph));
        self
    }

    pub fn with_shared_parameters(mut self, name: &str, container: ParameterContainer) -> Self {
        self.shared.push((name.to_string(), container));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.clock.set_time_scale(scale);
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = Some(capacity);
        self
    }

    pub fn build_runtime(self) -> Runtime {
        let mut runtime = Runtime::new(self.registry);
        runtime.set_clock(self.clock);
        if let Some(capacity) = self.pool_capacity {
            runtime.pool_mut().set_capacity(capacity);
        }
        for (name, graph) in self.assets {
            runtime.register_asset(&name, graph);
        }
        for (name, container) in self.shared {
            runtime.add_shared_parameters(&name, container);
        }
        runtime
    }

    pub fn build(self) -> Scheduler {
        Scheduler::new(self.build_runtime())
    }
}
