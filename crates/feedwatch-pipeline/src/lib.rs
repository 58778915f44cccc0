//! feedwatch Pipeline
//!
//! Routes events from the source channel through the log filter into the
//! display sinks.

pub mod pipeline;

pub use pipeline::Pipeline;
