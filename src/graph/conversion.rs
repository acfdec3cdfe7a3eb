use super::NodeGraph;
use crate::error::GraphError;

/// A trait for external graph formats that can be converted into a [`NodeGraph`].
///
/// Editors and importers keep their own file formats; implementing this trait is
/// the translation layer that hands the engine a ready-built graph. The conversion
/// should go through the [`NodeGraph`] editing methods so that ids and branches
/// stay consistent.
///
/// # Example
///
/// ```rust
/// use shikumi::prelude::*;
///
/// struct Fsm {
///     states: Vec<(String, Option<String>)>,
/// }
///
/// impl IntoGraph for Fsm {
///     fn into_graph(self) -> std::result::Result<NodeGraph, GraphError> {
///         let mut graph = NodeGraph::new("fsm");
///         let ids = self
///             .states
///             .iter()
///             .map(|(name, _)| graph.create_named(name, NodeKind::state()))
///             .collect::<std::result::Result<Vec<_>, _>>()?;
///         for (i, (_, next)) in self.states.iter().enumerate() {
///             let target = next
///                 .as_ref()
///                 .and_then(|n| self.states.iter().position(|(s, _)| s == n))
///                 .map(|j| ids[j]);
///             graph.add_link(ids[i], StateLink::new("next", target, TransitionTiming::LateUpdate))?;
///         }
///         Ok(graph)
///     }
/// }
///
/// let graph = Fsm {
///     states: vec![("A".into(), Some("B".into())), ("B".into(), None)],
/// }
/// .into_graph()
/// .unwrap();
/// assert_eq!(graph.states().count(), 2);
/// ```
pub trait IntoGraph {
    /// Consumes the object and converts it into an engine graph.
    fn into_graph(self) -> Result<NodeGraph, GraphError>;
}

impl IntoGraph for NodeGraph {
    fn into_graph(self) -> Result<NodeGraph, GraphError> {
        Ok(self)
    }
}
