//! feedwatch Output
//!
//! Display sinks for filtered lines: a bounded in-memory view and stdout.

pub mod stdout;
pub mod view;

pub use stdout::{OutputFormat, StdoutWriter};
pub use view::LogView;
