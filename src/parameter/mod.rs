//! Named, typed variables shared by the behaviours of a graph instance.
//!
//! A [`ParameterContainer`] owns the parameters. Behaviours never hold a parameter
//! directly; they hold a [`ParameterReference`] (or a [`FlexibleField`]) that is
//! resolved on every read through the [`NodeContext`](crate::behaviour::NodeContext).

pub mod container;
pub mod flexible;
pub mod reference;

pub use crate::graph::ParameterId;
pub use container::*;
pub use flexible::*;
pub use reference::*;
