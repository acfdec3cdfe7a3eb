use crate::graph::NodeGraph;
use crate::scheduler::GraphInstance;
use ahash::AHashMap;
use std::rc::Rc;
use tracing::debug;

/// Idle sub-graph instances, keyed by asset name.
///
/// Instances are boxed so that their identity survives being moved in and out
/// of the pool. An instance is only handed out again if it was built from the
/// asset's current graph.
#[derive(Debug)]
pub struct GraphPool {
    idle: AHashMap<String, Vec<Box<GraphInstance>>>,
    capacity: usize,
    created: usize,
    reused: usize,
}

impl Default for GraphPool {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

impl GraphPool {
    /// A pool keeping at most `capacity` idle instances per asset.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: AHashMap::new(),
            capacity,
            created: 0,
            reused: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        for instances in self.idle.values_mut() {
            instances.truncate(capacity);
        }
    }

    /// Number of idle instances of `asset`.
    pub fn idle(&self, asset: &str) -> usize {
        self.idle.get(asset).map_or(0, Vec::len)
    }

    /// Instances built because the pool had none to hand out.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Instances handed out again instead of being built.
    pub fn reused(&self) -> usize {
        self.reused
    }

    pub(crate) fn record_created(&mut self) {
        self.created += 1;
    }

    /// Takes an idle instance built from `graph`. Stale instances of an
    /// older version of the asset are dropped on the way.
    pub(crate) fn take(&mut self, asset: &str, graph: &Rc<NodeGraph>) -> Option<Box<GraphInstance>> {
        let instances = self.idle.get_mut(asset)?;
        instances.retain(|instance| Rc::ptr_eq(instance.graph(), graph));
        let instance = instances.pop()?;
        self.reused += 1;
        debug!(asset, instance = %instance.id(), "reusing pooled graph instance");
        Some(instance)
    }

    /// Returns a stopped instance. Instances of a replaced asset, or beyond
    /// capacity, are dropped.
    pub(crate) fn put(&mut self, instance: Box<GraphInstance>, current: Option<&Rc<NodeGraph>>) {
        let Some(asset) = instance.asset().map(str::to_string) else {
            return;
        };
        if !current.is_some_and(|graph| Rc::ptr_eq(instance.graph(), graph)) {
            debug!(asset = %asset, "dropping instance of a replaced asset");
            return;
        }
        let instances = self.idle.entry(asset).or_default();
        if instances.len() < self.capacity {
            instances.push(instance);
        }
    }

    /// Drops every idle instance of `asset`.
    pub fn discard(&mut self, asset: &str) {
        self.idle.remove(asset);
    }

    pub fn clear(&mut self) {
        self.idle.clear();
    }
}
