//! The node graph model: identity, storage and connectivity of nodes.
//!
//! A [`NodeGraph`] is an arena of [`Node`]s addressed by stable [`NodeId`]s.
//! Behaviour-tree edges are explicit [`NodeBranch`]es; state-machine edges are
//! [`StateLink`]s stored on their source state; data-flow edges are
//! [`DataBranch`](crate::dataflow::DataBranch)es between behaviour slots.
//! All structural edits go through the methods on [`NodeGraph`].

pub mod artifact;
pub mod conversion;
pub mod duplicate;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod ids;
pub mod link;
pub mod node;

pub use conversion::IntoGraph;
pub use duplicate::DuplicateMode;
pub use graph::{GraphSettings, NodeBranch, NodeGraph};
pub(crate) use ids::IdAllocator;
pub use ids::{BranchId, DataBranchId, NodeId, ParameterId};
pub use link::{LinkDisplay, StateLink, TransitionTiming};
pub use node::{BehaviourSpec, Node, NodeKind, Position, StateNode};
