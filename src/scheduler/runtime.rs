use super::{GraphInstance, InstanceId, UpdateMode};
use crate::behaviour::BehaviourRegistry;
use crate::clock::Clock;
use crate::error::InstanceError;
use crate::graph::NodeGraph;
use crate::parameter::ParameterContainer;
use crate::subgraph::GraphPool;
use ahash::AHashMap;
use std::rc::Rc;
use tracing::debug;

/// Explicit registry of everything graph instances share: behaviour factories,
/// graph assets, shared parameter containers, the instance pool and the clock.
///
/// There is no global state; every hook reaches the runtime through its
/// [`NodeContext`](crate::behaviour::NodeContext).
pub struct Runtime {
    registry: BehaviourRegistry,
    assets: AHashMap<String, Rc<NodeGraph>>,
    shared: AHashMap<String, ParameterContainer>,
    pool: GraphPool,
    clock: Clock,
    next_instance: u64,
    /// Assets of the instances currently driving a child graph, outermost first.
    hosts: Vec<Option<String>>,
}

/// Deepest chain of graphs hosting graphs the runtime will build.
pub const MAX_NESTING: usize = 16;

impl Default for Runtime {
    fn default() -> Self {
        Self::new(BehaviourRegistry::with_builtins())
    }
}

impl Runtime {
    pub fn new(registry: BehaviourRegistry) -> Self {
        Self {
            registry,
            assets: AHashMap::new(),
            shared: AHashMap::new(),
            pool: GraphPool::default(),
            clock: Clock::default(),
            next_instance: 1,
            hosts: Vec::new(),
        }
    }

    pub fn registry(&self) -> &BehaviourRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BehaviourRegistry {
        &mut self.registry
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub fn pool(&self) -> &GraphPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut GraphPool {
        &mut self.pool
    }

    // --- Assets ---

    /// Registers (or replaces) a named graph asset. Replacing an asset gives it a
    /// new identity, so hosts built from the old one re-instantiate on next entry.
    pub fn register_asset(&mut self, name: &str, graph: NodeGraph) -> Rc<NodeGraph> {
        let graph = Rc::new(graph);
        if self.assets.insert(name.to_string(), graph.clone()).is_some() {
            debug!(asset = name, "graph asset replaced");
        }
        graph
    }

    pub fn asset(&self, name: &str) -> Option<Rc<NodeGraph>> {
        self.assets.get(name).cloned()
    }

    pub fn remove_asset(&mut self, name: &str) -> bool {
        self.pool.discard(name);
        self.assets.remove(name).is_some()
    }

    // --- Nesting ---

    /// Whether a graph built from `asset` may start inside an instance of `host`.
    /// Refuses an asset that is already running further up the chain, and chains
    /// deeper than [`MAX_NESTING`].
    pub fn can_nest(&self, host: Option<&str>, asset: &str) -> bool {
        let running = host == Some(asset) || self.hosts.iter().flatten().any(|h| h == asset);
        !running && self.hosts.len() < MAX_NESTING
    }

    /// Runs `f` with `host` recorded as driving a child graph.
    pub(crate) fn nested<R>(&mut self, host: Option<&str>, f: impl FnOnce(&mut Runtime) -> R) -> R {
        self.hosts.push(host.map(str::to_string));
        let result = f(self);
        self.hosts.pop();
        result
    }

    // --- Shared parameters ---

    pub fn add_shared_parameters(&mut self, name: &str, container: ParameterContainer) {
        self.shared.insert(name.to_string(), container);
    }

    pub fn shared_parameters(&self, name: &str) -> Option<&ParameterContainer> {
        self.shared.get(name)
    }

    pub fn shared_parameters_mut(&mut self, name: &str) -> Option<&mut ParameterContainer> {
        self.shared.get_mut(name)
    }

    // --- Instances ---

    fn next_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        id
    }

    /// Builds a stopped instance of a registered asset.
    pub fn instantiate(&mut self, asset: &str) -> Result<GraphInstance, InstanceError> {
        let graph = self
            .asset(asset)
            .ok_or_else(|| InstanceError::AssetNotFound(asset.to_string()))?;
        let id = self.next_id();
        GraphInstance::build(id, Some(asset.to_string()), graph, &self.registry)
    }

    /// Builds a stopped instance of an unregistered graph.
    pub fn instantiate_graph(&mut self, graph: Rc<NodeGraph>) -> Result<GraphInstance, InstanceError> {
        let id = self.next_id();
        GraphInstance::build(id, None, graph, &self.registry)
    }

    /// Hands out a manual-mode instance of `asset`, reusing a pooled one built
    /// from the asset's current graph when available.
    pub fn acquire(&mut self, asset: &str) -> Result<Box<GraphInstance>, InstanceError> {
        let graph = self
            .asset(asset)
            .ok_or_else(|| InstanceError::AssetNotFound(asset.to_string()))?;
        let mut instance = match self.pool.take(asset, &graph) {
            Some(instance) => instance,
            None => {
                let id = self.next_id();
                self.pool.record_created();
                Box::new(GraphInstance::build(
                    id,
                    Some(asset.to_string()),
                    graph,
                    &self.registry,
                )?)
            }
        };
        instance.set_update_mode(UpdateMode::Manual);
        Ok(instance)
    }

    /// Stops an instance and returns it to the pool.
    pub fn release(&mut self, mut instance: Box<GraphInstance>) {
        instance.stop(self);
        let current = instance.asset().and_then(|asset| self.asset(asset));
        self.pool.put(instance, current.as_ref());
    }
}
