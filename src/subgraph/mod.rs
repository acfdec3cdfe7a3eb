//! Graphs running inside other graphs.
//!
//! A host behaviour (a state or an action) references a graph asset by name.
//! When the host enters it obtains a child instance, either freshly built or
//! taken from the runtime's [`GraphPool`], copies its input arguments into the
//! child's parameters and starts it in manual-update mode. The host then ticks
//! the child from its own hooks. On exit the output arguments are copied back
//! and the child is stopped, then returned to the pool when pooling is enabled.
//!
//! Pausing, resuming or stopping the parent reaches the child through the host's
//! hooks before the parent call returns.

pub mod argument;
pub mod host;
pub mod pool;

pub use argument::{ArgumentDirection, ArgumentTiming, GraphArgument};
pub use host::{SubGraphAction, SubGraphConfig, SubGraphHost, SubGraphState};
pub use pool::GraphPool;
