//! feedwatch Filter
//!
//! Decides which pipeline log lines reach the operator, rewrites them into
//! short display lines, and rate limits bursts.

pub mod filter;
pub mod format;
pub mod rules;

pub use filter::{FilterStats, LogFilter, Outcome};
pub use format::{normalize_whitespace, DisplayZone, LineFormatter};
pub use rules::{rss_discovery_regex, FilterRule, RuleKind, RuleSet};
