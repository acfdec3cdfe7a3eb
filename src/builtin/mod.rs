//! Primitive behaviours shipped with the engine.
//!
//! These are the few behaviours the engine itself relies on: the standard
//! composites, the time-gated decorators, the basic state transitions and the
//! sub-graph hosts. Every one of them is built from a [`BehaviourSpec`] whose
//! `config` is deserialized with serde, and registered under its type name by
//! [`register_builtins`].

pub mod action;
pub mod composite;
pub mod decorator;
pub mod state;

pub use action::Wait;
pub use composite::{Selector, Sequencer};
pub use decorator::{Cooldown, TimeLimit};
pub use state::{TimeTransition, TriggerTransition};

use crate::behaviour::{Behaviour, BehaviourRegistry};
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;
use crate::subgraph::{SubGraphAction, SubGraphState};

/// A behaviour that can be built from its declarative spec.
pub trait FromSpec: Sized {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError>;
}

impl FromSpec for SubGraphState {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(SubGraphState::new(spec.parse_config()?))
    }
}

impl FromSpec for SubGraphAction {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(SubGraphAction::new(spec.parse_config()?))
    }
}

/// Signature of a built-in factory.
pub type BuiltinFactory = fn(&BehaviourSpec) -> Result<Behaviour, BehaviourError>;

/// Defines the factory of every built-in behaviour, their registration and
/// their lookup by type name.
macro_rules! define_builtin_behaviours {
    ( $( ($ty:ty, $type_name:literal, $role:ident) ),* $(,)? ) => {
        /// Registers every built-in behaviour under its type name.
        pub fn register_builtins(registry: &mut BehaviourRegistry) {
            $(
                registry.register_fn($type_name, |spec: &BehaviourSpec| {
                    Ok(Behaviour::$role(<$ty>::from_spec(spec)?))
                });
            )*
        }

        /// The factory of the built-in behaviour registered as `name`.
        pub fn create_factory_by_name(name: &str) -> Option<BuiltinFactory> {
            match name {
                $(
                    $type_name => {
                        let factory: BuiltinFactory = |spec| Ok(Behaviour::$role(<$ty>::from_spec(spec)?));
                        Some(factory)
                    }
                )*
                _ => None,
            }
        }

        /// Type names of the built-in behaviours.
        pub const BUILTIN_TYPES: &[&str] = &[ $( $type_name ),* ];
    };
}

define_builtin_behaviours! {
    // Composites
    (Sequencer, "Sequencer", composite),
    (Selector, "Selector", composite),
    // Decorators
    (Cooldown, "Cooldown", decorator),
    (TimeLimit, "TimeLimit", decorator),
    // Actions
    (Wait, "Wait", action),
    (SubGraphAction, "SubGraphAction", action),
    // States
    (TriggerTransition, "TriggerTransition", state),
    (TimeTransition, "TimeTransition", state),
    (SubGraphState, "SubGraph", state),
}
