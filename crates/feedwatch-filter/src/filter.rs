use chrono::{DateTime, Duration, Utc};
use feedwatch_core::config::FilterConfig;
use feedwatch_core::{Clock, FeedwatchError, LogEvent, LogLevel, Result, SystemClock};
use tracing::{debug, trace};

use crate::format::{DisplayZone, LineFormatter};
use crate::rules::RuleSet;

/// What a single `process` call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not shown and not kept
    Suppressed,
    /// Held back by the rate limiter; may surface with a later emission
    Deferred,
    /// One display line
    Line(String),
    /// The current line first, then buffered lines in arrival order
    Burst(Vec<String>),
}

impl Outcome {
    /// True when nothing is to be displayed
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Suppressed | Outcome::Deferred)
    }

    pub fn lines(self) -> Vec<String> {
        match self {
            Outcome::Suppressed | Outcome::Deferred => Vec::new(),
            Outcome::Line(line) => vec![line],
            Outcome::Burst(lines) => lines,
        }
    }
}

/// Running counters for one filter instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub received: u64,
    /// Hidden by the rule set
    pub suppressed: u64,
    /// RSS discovery lines emitted without rate limiting
    pub exempt: u64,
    /// Display lines produced, including surfaced buffered ones
    pub emitted: u64,
    /// Events placed in the pending buffer
    pub deferred: u64,
    /// Buffered events cleared without being surfaced
    pub discarded: u64,
    /// Events dropped because the pending buffer was full
    pub overflowed: u64,
}

#[derive(Debug)]
struct FilterState {
    last_emit: Option<DateTime<Utc>>,
    min_interval: Duration,
    pending: Vec<LogEvent>,
}

/// Stateful log stream filter
///
/// Combines suppression, formatting, and a one-line-per-window rate limit.
/// Events arriving inside a window are buffered; the next emission carries
/// up to `burst_size` of them and clears the buffer.
pub struct LogFilter {
    rules: RuleSet,
    formatter: LineFormatter,
    clock: Box<dyn Clock>,
    state: FilterState,
    stats: FilterStats,
    burst_size: usize,
    max_pending: usize,
}

impl LogFilter {
    /// Create a filter from configuration, using the system clock
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let zone: DisplayZone = config.time_zone.parse().map_err(FeedwatchError::Config)?;
        let min_interval = i64::try_from(config.min_interval_ms)
            .map(Duration::milliseconds)
            .map_err(|_| {
                FeedwatchError::Config(format!(
                    "min_interval_ms out of range: {}",
                    config.min_interval_ms
                ))
            })?;

        let rules = RuleSet::from_config(config);
        debug!(
            ignore = rules.ignore_count(),
            important = rules.important_count(),
            min_interval_ms = config.min_interval_ms,
            zone = ?zone,
            "Log filter initialized"
        );

        Ok(Self::build(
            rules,
            LineFormatter::new(zone),
            min_interval,
            config.burst_size,
            config.max_pending,
        ))
    }

    /// Built-in rules, local time, 1s interval, bursts of 2
    pub fn with_defaults() -> Self {
        let defaults = FilterConfig::default();
        Self::build(
            RuleSet::builtin(),
            LineFormatter::default(),
            Duration::milliseconds(defaults.min_interval_ms as i64),
            defaults.burst_size,
            defaults.max_pending,
        )
    }

    fn build(
        rules: RuleSet,
        formatter: LineFormatter,
        min_interval: Duration,
        burst_size: usize,
        max_pending: usize,
    ) -> Self {
        Self {
            rules,
            formatter,
            clock: Box::new(SystemClock),
            state: FilterState {
                last_emit: None,
                min_interval,
                pending: Vec::new(),
            },
            stats: FilterStats::default(),
            burst_size,
            // keeping fewer than burst_size would change what surfaces
            max_pending: max_pending.max(burst_size),
        }
    }

    /// Replace the time source; tests pass a `ManualClock`
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Render times in `zone` instead of the configured one
    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.formatter = LineFormatter::new(zone);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Check whether a message passes the rule set.
    ///
    /// Ignore rules are consulted first; a message is shown only if no ignore
    /// rule matches and some important rule does.
    pub fn should_show(&self, message: &str) -> bool {
        self.rules.should_show(message)
    }

    /// Format a message for display, using the clock when the timestamp is
    /// missing or malformed
    pub fn format(&self, level: LogLevel, message: &str, timestamp: Option<&str>) -> String {
        self.formatter.format(level, message, timestamp, self.clock.now())
    }

    /// Process one message from the stream
    pub fn process(&mut self, level: LogLevel, message: &str, timestamp: Option<&str>) -> Outcome {
        let mut event = LogEvent::new(level, message);
        event.timestamp = timestamp.map(str::to_string);
        self.process_event(event)
    }

    /// Run an event through suppression, the RSS exemption and the rate limiter.
    ///
    /// An emission after a quiet interval surfaces up to `burst_size` buffered
    /// events after the current line and clears the rest of the buffer.
    pub fn process_event(&mut self, event: LogEvent) -> Outcome {
        self.stats.received += 1;

        if !self.rules.should_show(&event.message) {
            trace!(message = %event.message, "Suppressed");
            self.stats.suppressed += 1;
            return Outcome::Suppressed;
        }

        let now = self.clock.now();

        if self.rules.is_exempt(&event.message) {
            self.stats.exempt += 1;
            self.stats.emitted += 1;
            return Outcome::Line(self.formatter.format_event(&event, now));
        }

        if let Some(last) = self.state.last_emit {
            if now - last < self.state.min_interval {
                self.defer(event);
                return Outcome::Deferred;
            }
        }
        self.state.last_emit = Some(now);

        let current = self.formatter.format_event(&event, now);
        let pending = std::mem::take(&mut self.state.pending);
        if pending.is_empty() {
            self.stats.emitted += 1;
            return Outcome::Line(current);
        }

        let mut lines = vec![current];
        lines.extend(
            pending
                .iter()
                .filter(|e| self.rules.should_show(&e.message) && !self.rules.is_exempt(&e.message))
                .take(self.burst_size)
                .map(|e| self.formatter.format_event(e, now)),
        );

        let surfaced = lines.len() - 1;
        let discarded = pending.len() - surfaced;
        self.stats.emitted += lines.len() as u64;
        self.stats.discarded += discarded as u64;
        debug!(surfaced, discarded, "Flushed pending buffer");

        if surfaced == 0 {
            Outcome::Line(lines.remove(0))
        } else {
            Outcome::Burst(lines)
        }
    }

    fn defer(&mut self, event: LogEvent) {
        if self.state.pending.len() >= self.max_pending {
            self.stats.overflowed += 1;
            trace!(max_pending = self.max_pending, "Pending buffer full, dropping event");
            return;
        }
        self.state.pending.push(event);
        self.stats.deferred += 1;
    }

    /// Number of events waiting for the next emission
    pub fn pending_len(&self) -> usize {
        self.state.pending.len()
    }

    /// Counters since construction
    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    pub fn min_interval(&self) -> Duration {
        self.state.min_interval
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
