use super::Behaviour;
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;
use ahash::AHashMap;
use itertools::Itertools;
use std::fmt;

/// Builds a live behaviour from its declarative spec.
pub trait BehaviourFactory {
    fn create(&self, spec: &BehaviourSpec) -> Result<Behaviour, BehaviourError>;
}

impl<F> BehaviourFactory for F
where
    F: Fn(&BehaviourSpec) -> Result<Behaviour, BehaviourError>,
{
    fn create(&self, spec: &BehaviourSpec) -> Result<Behaviour, BehaviourError> {
        self(spec)
    }
}

/// Maps behaviour type names to factories.
///
/// The registry is explicit state owned by the [`Runtime`](crate::scheduler::Runtime);
/// there is no process-wide lookup.
#[derive(Default)]
pub struct BehaviourRegistry {
    factories: AHashMap<String, Box<dyn BehaviourFactory>>,
}

impl BehaviourRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the engine's built-in behaviours.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    /// Registers a factory, replacing any previous one for the same type name.
    pub fn register(&mut self, type_name: &str, factory: impl BehaviourFactory + 'static) {
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
    }

    /// Registers a closure factory.
    pub fn register_fn<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&BehaviourSpec) -> Result<Behaviour, BehaviourError> + 'static,
    {
        self.register(type_name, factory);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn create(&self, spec: &BehaviourSpec) -> Result<Behaviour, BehaviourError> {
        self.factories
            .get(&spec.type_name)
            .ok_or_else(|| BehaviourError::UnknownType(spec.type_name.clone()))?
            .create(spec)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).sorted().collect()
    }
}

impl fmt::Debug for BehaviourRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviourRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
