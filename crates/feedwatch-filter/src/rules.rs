use feedwatch_core::config::{FilterConfig, NamedPattern};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// What a rule does when it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Suppress the message, whatever else matches
    Ignore,
    /// Make the message eligible for display
    Important,
}

/// A compiled classification rule
#[derive(Debug, Clone)]
pub struct FilterRule {
    name: String,
    kind: RuleKind,
    regex: Regex,
    /// Rejects a match when the rest of its line matches this
    unless_followed_by: Option<Regex>,
}

impl FilterRule {
    pub fn new(name: impl Into<String>, kind: RuleKind, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            kind,
            regex: Regex::new(pattern)?,
            unless_followed_by: None,
        })
    }

    fn from_regex(name: &str, kind: RuleKind, regex: Regex) -> Self {
        Self {
            name: name.to_string(),
            kind,
            regex,
            unless_followed_by: None,
        }
    }

    /// Only match where the remainder of the line does not match `pattern`
    pub fn unless_followed_by(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.unless_followed_by = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_match(&self, message: &str) -> bool {
        let Some(guard) = &self.unless_followed_by else {
            return self.regex.is_match(message);
        };

        self.regex.find_iter(message).any(|m| {
            let rest = &message[m.end()..];
            let line = rest
                .split(['\n', '\r', '\u{2028}', '\u{2029}'])
                .next()
                .unwrap_or_default();
            !guard.is_match(line)
        })
    }
}

static RSS_DISCOVERY_REGEX: OnceLock<Regex> = OnceLock::new();
static BUILTIN_RULES: OnceLock<RuleSet> = OnceLock::new();

/// Matches the per-source summary emitted by the RSS discovery phase:
/// `RSS discovery for {source} (total_entries={n}, new_articles={m}, last_parsed={date})`
pub fn rss_discovery_regex() -> &'static Regex {
    RSS_DISCOVERY_REGEX.get_or_init(|| {
        Regex::new(
            r"RSS discovery for ([A-Za-z0-9_]+) \(total_entries=([0-9]+), new_articles=([0-9]+), last_parsed=([^)]+)\)",
        )
        .unwrap()
    })
}

// Captures stop at \n, \r, U+2028 and U+2029; digits are ASCII only
const BUILTIN_IMPORTANT: &[(&str, &str)] = &[
    ("successfully_parsed", r"Successfully parsed ([^\n\r\x{2028}\x{2029}]+)"),
    ("failed_to_parse", r"Failed to parse ([^\n\r\x{2028}\x{2029}]+)"),
    ("media_downloaded", r"Downloaded media from ([^\n\r\x{2028}\x{2029}]+)"),
    ("phase_started", r"Phase ([0-9]) started"),
    ("phase_completed", r"Phase completed: ([^\n\r\x{2028}\x{2029}]+)"),
    ("completed_in", r"Completed in ([^\n\r\x{2028}\x{2029}]+) seconds"),
    ("severity", r"ERROR|CRITICAL|WARNING"),
];

const BUILTIN_IGNORE: &[(&str, &str)] = &[
    ("db_optimizations", r"Database performance optimizations applied"),
    ("monitoring_db_init", r"Monitoring database initialized"),
    // "starting" is inserted here, see `build_builtin`
    ("loaded", r"INFO - Loaded"),
    ("initialized", r"initialized"),
    ("scheduler", r"Scheduler"),
    ("apscheduler", r"apscheduler"),
    ("websocket", r"WebSocket"),
    ("connection_open", r"connection open"),
    ("http_access", r"HTTP/1\.1"),
    ("resource_collection", r"Error collecting system resources"),
];

fn build_builtin() -> RuleSet {
    let compile = |(name, pattern): &(&str, &str), kind| {
        FilterRule::from_regex(name, kind, Regex::new(pattern).unwrap())
    };

    let mut important = vec![FilterRule::from_regex(
        "rss_discovery",
        RuleKind::Important,
        rss_discovery_regex().clone(),
    )];
    important.extend(BUILTIN_IMPORTANT.iter().map(|p| compile(p, RuleKind::Important)));

    let mut ignore: Vec<FilterRule> = BUILTIN_IGNORE
        .iter()
        .map(|p| compile(p, RuleKind::Ignore))
        .collect();
    let starting = FilterRule::new("starting", RuleKind::Ignore, r"INFO - Starting")
        .and_then(|rule| rule.unless_followed_by(r"RSS discovery"))
        .unwrap();
    ignore.insert(2, starting);

    RuleSet { ignore, important }
}

/// Ordered ignore and important rules
///
/// Ignore rules are always consulted first and win over any important rule.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    ignore: Vec<FilterRule>,
    important: Vec<FilterRule>,
}

impl RuleSet {
    /// A rule set with no rules; nothing is shown
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules the pipeline dashboard ships with
    pub fn builtin() -> Self {
        BUILTIN_RULES.get_or_init(build_builtin).clone()
    }

    /// Built-in rules followed by the configured extras
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut rules = Self::builtin();
        rules.extend_from(&config.extra_ignore, RuleKind::Ignore);
        rules.extend_from(&config.extra_important, RuleKind::Important);
        rules
    }

    fn extend_from(&mut self, patterns: &[NamedPattern], kind: RuleKind) {
        for p in patterns {
            match FilterRule::new(p.name.clone(), kind, &p.pattern) {
                Ok(rule) => {
                    debug!(rule = %p.name, kind = ?kind, "Loaded extra filter rule");
                    self.push(rule);
                }
                Err(e) => {
                    warn!(
                        rule = %p.name,
                        error = %e,
                        "Failed to compile filter pattern, skipping"
                    );
                }
            }
        }
    }

    /// Append a rule after the existing rules of its kind
    pub fn push(&mut self, rule: FilterRule) {
        match rule.kind {
            RuleKind::Ignore => self.ignore.push(rule),
            RuleKind::Important => self.important.push(rule),
        }
    }

    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.push(rule);
        self
    }

    /// First ignore rule matching `message`, in declaration order
    pub fn ignored_by(&self, message: &str) -> Option<&FilterRule> {
        self.ignore.iter().find(|r| r.is_match(message))
    }

    /// First important rule matching `message`, in declaration order
    pub fn important_by(&self, message: &str) -> Option<&FilterRule> {
        self.important.iter().find(|r| r.is_match(message))
    }

    pub fn should_show(&self, message: &str) -> bool {
        if self.ignored_by(message).is_some() {
            return false;
        }
        self.important_by(message).is_some()
    }

    /// RSS discovery summaries bypass rate limiting
    pub fn is_exempt(&self, message: &str) -> bool {
        rss_discovery_regex().is_match(message)
    }

    pub fn ignore_count(&self) -> usize {
        self.ignore.len()
    }

    pub fn important_count(&self) -> usize {
        self.important.len()
    }
}
