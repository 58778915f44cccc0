use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use feedwatch_core::{LogEvent, LogLevel};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::rules::rss_discovery_regex;

/// Zone used to render the `HH:MM:SS` part of a display line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// The host's local time zone
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Render an instant as 24-hour `HH:MM:SS` in this zone
    pub fn clock_time(&self, instant: DateTime<Utc>) -> String {
        const FMT: &str = "%H:%M:%S";
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).format(FMT).to_string(),
            DisplayZone::Utc => instant.format(FMT).to_string(),
            DisplayZone::Fixed(offset) => instant.with_timezone(offset).format(FMT).to_string(),
        }
    }
}

impl FromStr for DisplayZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "" => Ok(DisplayZone::Local),
            "utc" | "z" => Ok(DisplayZone::Utc),
            other => parse_offset(other)
                .map(DisplayZone::Fixed)
                .ok_or_else(|| format!("invalid time zone '{}': expected local, utc or +HH:MM", s)),
        }
    }
}

/// `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Producer timestamp after parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stamp {
    /// Carries an offset; shown converted to the display zone
    Instant(DateTime<Utc>),
    /// No offset; shown as written
    Wall(NaiveDateTime),
}

fn parse_stamp(raw: &str) -> Option<Stamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Stamp::Instant(dt.with_timezone(&Utc)));
    }

    // Python's logging uses a comma before the milliseconds
    let normalized = raw.replacen(',', ".", 1);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(Stamp::Wall)
}

/// Everything a transform may look at
struct Line<'a> {
    level: LogLevel,
    message: &'a str,
    timestamp: Option<&'a str>,
    now: DateTime<Utc>,
    zone: DisplayZone,
}

impl Line<'_> {
    /// `HH:MM:SS` from the producer timestamp, or from `now` if it is missing or malformed
    fn time(&self) -> String {
        match self.timestamp.and_then(parse_stamp) {
            Some(Stamp::Instant(instant)) => self.zone.clock_time(instant),
            Some(Stamp::Wall(wall)) => wall.format("%H:%M:%S").to_string(),
            None => self.zone.clock_time(self.now),
        }
    }
}

struct Transform {
    name: &'static str,
    applies: fn(&Line) -> bool,
    render: fn(&Line) -> String,
}

static FORMATTED_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();
static PARSED_REGEX: OnceLock<Regex> = OnceLock::new();
static FAILED_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_formatted_prefix_regex() -> &'static Regex {
    FORMATTED_PREFIX_REGEX.get_or_init(|| {
        Regex::new(r"^\[(?:DEBUG|INFO|WARNING|ERROR|CRITICAL)\] \[[0-9]{2}:[0-9]{2}:[0-9]{2}\] ").unwrap()
    })
}

fn get_parsed_regex() -> &'static Regex {
    PARSED_REGEX.get_or_init(|| {
        Regex::new(r"Successfully parsed ([^\n\r\x{2028}\x{2029}]+)").unwrap()
    })
}

fn get_failed_regex() -> &'static Regex {
    FAILED_REGEX.get_or_init(|| {
        Regex::new(
            r"Failed to parse ([^\n\r\x{2028}\x{2029}]+)|Failed: ([^\n\r\x{2028}\x{2029}]+)",
        )
        .unwrap()
    })
}

fn render_rss(line: &Line) -> String {
    match rss_discovery_regex().captures(line.message) {
        Some(caps) => format!(
            "[INFO] [{}] {}: {} записей, {} новых",
            line.time(),
            &caps[1],
            &caps[2],
            &caps[3]
        ),
        None => line.message.to_string(),
    }
}

fn render_parsed(line: &Line) -> String {
    let subject = get_parsed_regex()
        .captures(line.message)
        .and_then(|caps| caps.get(1))
        .map_or("Источник", |m| m.as_str());
    format!("{} обработан", subject)
}

fn render_failed(line: &Line) -> String {
    let reason = get_failed_regex()
        .captures(line.message)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map_or(line.message, |m| m.as_str());
    format!("Ошибка: {}", reason)
}

fn unchanged(line: &Line) -> String {
    line.message.to_string()
}

/// Checked top to bottom, first match wins
const TRANSFORMS: &[Transform] = &[
    Transform {
        name: "already_formatted",
        applies: |l| get_formatted_prefix_regex().is_match(l.message),
        render: unchanged,
    },
    Transform {
        name: "rss_discovery",
        applies: |l| rss_discovery_regex().is_match(l.message),
        render: render_rss,
    },
    Transform {
        name: "completed",
        applies: |l| l.message.contains("COMPLETED"),
        render: |l| format!("[INFO] [{}] {}", l.time(), l.message),
    },
    Transform {
        name: "parsed",
        applies: |l| l.message.contains("Successfully parsed"),
        render: render_parsed,
    },
    Transform {
        name: "failed",
        applies: |l| l.message.contains("Failed"),
        render: render_failed,
    },
    Transform {
        name: "phase_started",
        applies: |l| l.message.contains("Phase") && l.message.contains("started"),
        render: unchanged,
    },
    Transform {
        name: "completed_in",
        applies: |l| l.message.contains("Completed in"),
        render: unchanged,
    },
    Transform {
        name: "severity",
        applies: |l| {
            matches!(l.level, LogLevel::Error | LogLevel::Critical | LogLevel::Warning)
        },
        render: unchanged,
    },
];

/// Collapse whitespace runs to a single space and trim the ends
pub fn normalize_whitespace(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns raw events into display lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormatter {
    zone: DisplayZone,
}

impl LineFormatter {
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Format one event; `now` stands in for a missing or malformed timestamp
    pub fn format(
        &self,
        level: LogLevel,
        message: &str,
        timestamp: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let line = Line {
            level,
            message,
            timestamp,
            now,
            zone: self.zone,
        };

        TRANSFORMS
            .iter()
            .find(|t| (t.applies)(&line))
            .map(|t| (t.render)(&line))
            .unwrap_or_else(|| normalize_whitespace(message))
    }

    pub fn format_event(&self, event: &LogEvent, now: DateTime<Utc>) -> String {
        self.format(event.level, &event.message, event.timestamp.as_deref(), now)
    }

    /// Name of the transform that would handle `message`, for diagnostics
    pub fn transform_name(&self, level: LogLevel, message: &str) -> &'static str {
        let line = Line {
            level,
            message,
            timestamp: None,
            now: DateTime::<Utc>::MIN_UTC,
            zone: self.zone,
        };
        TRANSFORMS
            .iter()
            .find(|t| (t.applies)(&line))
            .map_or("normalize", |t| t.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 9, 10).unwrap()
    }

    fn utc() -> LineFormatter {
        LineFormatter::new(DisplayZone::Utc)
    }

    #[test]
    fn test_rss_discovery_line() {
        let out = utc().format(
            LogLevel::Info,
            "RSS discovery for openai (total_entries=120, new_articles=3, last_parsed=2024-01-01T00:00:00Z)",
            Some("2024-01-01T10:15:30Z"),
            now(),
        );
        assert_eq!(out, "[INFO] [10:15:30] openai: 120 записей, 3 новых");
    }

    #[test]
    fn test_rss_discovery_uses_info_tag_for_any_level() {
        let out = utc().format(
            LogLevel::Warning,
            "RSS discovery for wired_ai (total_entries=40, new_articles=0, last_parsed=never)",
            Some("2024-01-01T23:59:59Z"),
            now(),
        );
        assert_eq!(out, "[INFO] [23:59:59] wired_ai: 40 записей, 0 новых");
    }

    #[test]
    fn test_fixed_zone_conversion() {
        let zone: DisplayZone = "+03:00".parse().unwrap();
        let out = LineFormatter::new(zone).format(
            LogLevel::Info,
            "Batch COMPLETED",
            Some("2024-01-01T22:00:00Z"),
            now(),
        );
        assert_eq!(out, "[INFO] [01:00:00] Batch COMPLETED");
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let out = utc().format(LogLevel::Info, "Batch COMPLETED", None, now());
        assert_eq!(out, "[INFO] [08:09:10] Batch COMPLETED");
    }

    #[test]
    fn test_malformed_timestamp_uses_now() {
        let out = utc().format(LogLevel::Info, "Batch COMPLETED", Some("yesterday-ish"), now());
        assert_eq!(out, "[INFO] [08:09:10] Batch COMPLETED");
    }

    #[test]
    fn test_naive_timestamps_shown_as_written() {
        let f = LineFormatter::new("+05:00".parse().unwrap());
        for ts in ["2024-01-01T07:08:09", "2024-01-01 07:08:09.123", "2024-01-01 07:08:09,123"] {
            let out = f.format(LogLevel::Info, "Batch COMPLETED", Some(ts), now());
            assert_eq!(out, "[INFO] [07:08:09] Batch COMPLETED", "timestamp {ts}");
        }
    }

    #[test]
    fn test_completed_is_not_wrapped_twice() {
        let f = utc();
        let once = f.format(LogLevel::Info, "Pipeline COMPLETED", Some("2024-01-01T10:00:00Z"), now());
        let twice = f.format(LogLevel::Info, &once, Some("2024-01-01T11:00:00Z"), now());
        assert_eq!(once, "[INFO] [10:00:00] Pipeline COMPLETED");
        assert_eq!(twice, once);

        let adversarial = "[INFO] [10:00:00] [INFO] [09:00:00] Pipeline COMPLETED";
        assert_eq!(f.format(LogLevel::Info, adversarial, None, now()), adversarial);
    }

    #[test]
    fn test_successfully_parsed() {
        let f = utc();
        assert_eq!(
            f.format(LogLevel::Info, "Successfully parsed https://openai.com/a", None, now()),
            "https://openai.com/a обработан"
        );
        assert_eq!(
            f.format(LogLevel::Info, "Successfully parsed", None, now()),
            "Источник обработан"
        );
    }

    #[test]
    fn test_failed() {
        let f = utc();
        assert_eq!(
            f.format(LogLevel::Error, "Failed to parse https://x.io/1", None, now()),
            "Ошибка: https://x.io/1"
        );
        assert_eq!(
            f.format(LogLevel::Error, "Failed: timeout after 30s", None, now()),
            "Ошибка: timeout after 30s"
        );
        assert_eq!(
            f.format(LogLevel::Error, "Translation Failed", None, now()),
            "Ошибка: Translation Failed"
        );
    }

    #[test]
    fn test_captures_stop_at_line_terminators() {
        let f = utc();
        assert_eq!(
            f.format(LogLevel::Info, "Successfully parsed feed-a\rtrailer", None, now()),
            "feed-a обработан"
        );
        assert_eq!(
            f.format(LogLevel::Error, "Failed to parse x.io\u{2028}more", None, now()),
            "Ошибка: x.io"
        );
        assert_eq!(
            f.format(LogLevel::Info, "Successfully parsed \r", None, now()),
            "Источник обработан"
        );
    }

    #[test]
    fn test_rss_discovery_needs_ascii_digits() {
        let msg = "RSS discovery for openai (total_entries=١٢٠, new_articles=٣, last_parsed=x)";
        assert_eq!(utc().transform_name(LogLevel::Info, msg), "normalize");
    }

    #[test]
    fn test_passthrough_cases_keep_spacing() {
        let f = utc();
        assert_eq!(f.format(LogLevel::Info, "Phase 2  started", None, now()), "Phase 2  started");
        assert_eq!(
            f.format(LogLevel::Info, " Completed in 3.2 seconds", None, now()),
            " Completed in 3.2 seconds"
        );
        assert_eq!(f.format(LogLevel::Warning, "disk  low ", None, now()), "disk  low ");
    }

    #[test]
    fn test_default_normalizes_whitespace() {
        let out = utc().format(LogLevel::Info, "  Downloaded media from\t cdn  \n", None, now());
        assert_eq!(out, "Downloaded media from cdn");
    }

    #[test]
    fn test_transform_name() {
        let f = utc();
        assert_eq!(f.transform_name(LogLevel::Info, "Batch COMPLETED"), "completed");
        assert_eq!(f.transform_name(LogLevel::Debug, "hello"), "normalize");
        assert_eq!(f.transform_name(LogLevel::Critical, "hello"), "severity");
    }

    #[test]
    fn test_display_zone_from_str() {
        assert_eq!("local".parse::<DisplayZone>(), Ok(DisplayZone::Local));
        assert_eq!("UTC".parse::<DisplayZone>(), Ok(DisplayZone::Utc));
        assert_eq!(
            "-04:30".parse::<DisplayZone>(),
            Ok(DisplayZone::Fixed(FixedOffset::west_opt(4 * 3600 + 1800).unwrap()))
        );
        assert_eq!(
            "+0530".parse::<DisplayZone>(),
            Ok(DisplayZone::Fixed(FixedOffset::east_opt(5 * 3600 + 1800).unwrap()))
        );
        assert!("mars/olympus".parse::<DisplayZone>().is_err());
        assert!("+03:75".parse::<DisplayZone>().is_err());
    }
}
