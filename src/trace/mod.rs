//! Human-readable views of running graph instances.

pub mod formatter;

pub use formatter::TraceFormatter;
