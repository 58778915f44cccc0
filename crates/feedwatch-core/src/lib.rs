//! feedwatch Core
//!
//! Core types, configuration, and the clock seam shared by the feedwatch crates.

pub mod config;
pub mod error;
pub mod log_event;
pub mod traits;

// Re-export commonly used types
pub use config::Config;
pub use error::{FeedwatchError, IngestionError, OutputError, Result};
pub use log_event::{LogEvent, LogLevel, UnknownLevel};
pub use traits::{Clock, ManualClock, SystemClock};
