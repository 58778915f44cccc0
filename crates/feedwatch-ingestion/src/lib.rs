//! feedwatch Ingestion
//!
//! Event sources for feedwatch: stdin and a line-oriented TCP feed.

pub mod manager;
pub mod parse;
pub mod stdin;
pub mod tcp;

pub use manager::IngestionManager;
pub use parse::parse_event_line;
pub use stdin::StdinReader;
pub use tcp::TcpIngestion;

use feedwatch_core::LogEvent;
use tokio::sync::mpsc;

/// Default channel buffer size for events
pub const DEFAULT_CHANNEL_SIZE: usize = 10_000;

/// Create a new channel for events
pub fn create_event_channel(buffer_size: usize) -> (mpsc::Sender<LogEvent>, mpsc::Receiver<LogEvent>) {
    mpsc::channel(buffer_size.max(1))
}
