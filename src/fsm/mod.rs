//! The state-machine engine.
//!
//! States are nodes; [`StateLink`](crate::graph::StateLink)s are their outgoing
//! transitions. A transition request is checked against the link table and the
//! per-window lock, then committed according to its
//! [`TransitionTiming`](crate::graph::TransitionTiming).

pub mod machine;

pub use machine::{StateMachine, StatePhase};
