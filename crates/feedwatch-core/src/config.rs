use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::error::FeedwatchError;

/// Main configuration for feedwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Event sources
    pub ingestion: IngestionConfig,

    /// Log stream filter policy
    pub filter: FilterConfig,

    /// Display sinks
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, FeedwatchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FeedwatchError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, FeedwatchError> {
        toml::from_str(content)
            .map_err(|e| FeedwatchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, FeedwatchError> {
        toml::to_string_pretty(self)
            .map_err(|e| FeedwatchError::Config(format!("Failed to serialize config: {}", e)))
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Instance name for identification
    pub instance_name: String,

    /// Internal log level: trace, debug, info, warn, error
    pub log_level: String,

    /// Capacity of the event channel between sources and the filter
    pub buffer_size: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: "feedwatch".to_string(),
            log_level: "warn".to_string(),
            buffer_size: 10_000,
        }
    }
}

/// Event source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub stdin: StdinConfig,

    /// Line-oriented TCP push feed
    pub tcp: TcpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StdinConfig {
    pub enabled: bool,
}

impl Default for StdinConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1".to_string(),
            port: 9514,
            max_connections: 16,
        }
    }
}

/// Log stream filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum gap between two rate-limited emissions, in milliseconds
    pub min_interval_ms: u64,

    /// How many deferred lines are surfaced with the next emission
    pub burst_size: usize,

    /// How many deferred events are retained per window; later ones are dropped
    pub max_pending: usize,

    /// Zone used to render `HH:MM:SS`: "local", "utc" or an offset like "+03:00"
    pub time_zone: String,

    /// Extra suppression patterns, checked after the built-in ones
    pub extra_ignore: Vec<NamedPattern>,

    /// Extra importance patterns, checked after the built-in ones
    pub extra_important: Vec<NamedPattern>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            burst_size: 2,
            max_pending: 64,
            time_zone: "local".to_string(),
            extra_ignore: Vec::new(),
            extra_important: Vec::new(),
        }
    }
}

/// A user supplied regular expression with a name for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: String,
}

/// Display sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub stdout: StdoutConfig,

    /// In-memory view of recent lines
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StdoutConfig {
    pub enabled: bool,
    /// Format: plain, json
    pub format: String,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Number of most recent lines kept
    pub max_lines: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { max_lines: 100 }
    }
}
