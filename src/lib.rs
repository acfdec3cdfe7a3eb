//! # Shikumi - Graph Execution Engine
//!
//! **Shikumi** runs node graphs that are, at the same time, hierarchical state
//! machines, behaviour trees and typed data-flow networks. Nodes carry
//! behaviours; the engine decides when each behaviour hook runs and guarantees
//! the ordering between them, tick after tick.
//!
//! ## Core Workflow
//!
//! 1.  **Build a graph**: Create a [`NodeGraph`](graph::NodeGraph) with its editing
//!     methods, load one from JSON or bincode, or implement
//!     [`IntoGraph`](graph::IntoGraph) for your own editor format.
//! 2.  **Register behaviours**: Behaviours are built per instance from the
//!     declarative [`BehaviourSpec`](graph::BehaviourSpec)s on the nodes, through
//!     factories registered by type name. The built-ins cover composites, time
//!     gates, basic transitions and sub-graphs.
//! 3.  **Schedule**: Use [`Scheduler::builder`](scheduler::Scheduler::builder) to
//!     register assets and factories, spawn instances, then drive them from the
//!     host loop with `execute_update`, `execute_fixed_update` and
//!     `execute_late_update`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shikumi::prelude::*;
//! use shikumi::builtin::TriggerTransition;
//!
//! fn main() -> Result<()> {
//!     let mut graph = NodeGraph::new("door");
//!     let closed = graph.create_named("Closed", NodeKind::state())?;
//!     let open = graph.create_named("Open", NodeKind::state())?;
//!     graph.add_link(closed, StateLink::new("open", Some(open), TransitionTiming::Immediate))?;
//!     graph.add_link(open, StateLink::new("close", Some(closed), TransitionTiming::LateUpdate))?;
//!     graph.add_behaviour(
//!         closed,
//!         BehaviourSpec::new("TriggerTransition")
//!             .with_config(serde_json::to_value(TriggerTransition::new("push", "open"))?),
//!     )?;
//!
//!     let mut scheduler = Scheduler::builder().with_asset("door", graph).build();
//!     let door = scheduler.spawn("door")?;
//!
//!     scheduler.send_trigger(door, "push")?;
//!     scheduler.advance(1.0 / 60.0);
//!
//!     if let Some(instance) = scheduler.instance(door) {
//!         println!("{}", TraceFormatter::format_instance(instance));
//!     }
//!     Ok(())
//! }
//! ```

pub mod behaviour;
pub mod builtin;
pub mod clock;
pub mod dataflow;
pub mod error;
pub mod fsm;
pub mod graph;
pub mod parameter;
pub mod prelude;
pub mod scheduler;
pub mod subgraph;
pub mod trace;
pub mod tree;
pub mod value;
