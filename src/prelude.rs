//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the shikumi
//! crate. Import it to build graphs, write behaviours and drive instances without
//! importing each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use shikumi::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let graph = NodeGraph::from_file("path/to/graph.json")?;
//! let mut scheduler = Scheduler::builder().with_asset("main", graph).build();
//! let id = scheduler.spawn("main")?;
//!
//! for _ in 0..60 {
//!     scheduler.advance(1.0 / 60.0);
//! }
//! println!("{:?}", scheduler.instance(id).and_then(|i| i.current_state()));
//! # Ok(())
//! # }
//! ```

// Graph model
pub use crate::graph::{
    BehaviourSpec, DuplicateMode, GraphSettings, IntoGraph, Node, NodeGraph, NodeId, NodeKind,
    StateLink, TransitionTiming,
};

// Behaviours
pub use crate::behaviour::{
    AbortFlags, AbortSense, ActionBehaviour, Behaviour, BehaviourRegistry, Calculator,
    CompositeBehaviour, CompositeStep, DecoratorBehaviour, NodeContext, ServiceBehaviour,
    StateBehaviour, Status, TickPhase,
};

// Values, slots and parameters
pub use crate::dataflow::SlotRef;
pub use crate::parameter::{FlexibleField, ParameterContainer, ParameterHandle, ParameterReference};
pub use crate::value::{FromValue, Value, ValueType};

// Runtime
pub use crate::clock::{Clock, TimeBase};
pub use crate::scheduler::{GraphInstance, InstanceId, PlayState, Runtime, Scheduler, UpdateMode};
pub use crate::subgraph::{GraphArgument, SubGraphConfig};

// Error types
pub use crate::error::{
    ArtifactError, BehaviourError, GraphError, InstanceError, ParameterError, SlotError,
};

// Trace formatting
pub use crate::trace::TraceFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
