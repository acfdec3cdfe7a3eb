//! The behaviour-tree engine.
//!
//! Composites choose which child runs, decorators gate a single child with a
//! condition, actions do the leaf work and services run alongside their owner.
//! Abort scanning happens once per tree pass, top-down over the active path,
//! before any leaf executes. When two decorators would abort in the same pass,
//! the one nearer to the root wins.

pub mod runner;

pub use runner::{TreeRunner, TreeState};
pub(crate) use runner::TickEnv;
