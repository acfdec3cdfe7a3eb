//! Typed data flow between behaviour slots.
//!
//! A producer writes its outputs when it executes; consumers read whatever was
//! last written. Calculators are the exception: they are pulled lazily, at most
//! once per pass, the first time one of their outputs is read. Type compatibility
//! is checked when a [`DataBranch`] is created, never when a value is read.

pub mod slot;
pub mod store;

pub use slot::*;
pub use store::DataStore;
