use thiserror::Error;

/// Core error types for feedwatch
#[derive(Debug, Error)]
pub enum FeedwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors specific to event sources
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Failed to read from stdin: {0}")]
    Stdin(String),

    #[error("TCP connection error: {0}")]
    Tcp(String),

    #[error("Malformed event line: {0}")]
    Parse(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors specific to display sinks
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Stdout write error: {0}")]
    Stdout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for feedwatch operations
pub type Result<T> = std::result::Result<T, FeedwatchError>;
