use feedwatch_core::{IngestionError, LogEvent, LogLevel};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

/// JSON shape of an event line; accepts the common Python logging names
#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default, alias = "levelname")]
    level: Option<String>,

    #[serde(default, alias = "msg")]
    message: Option<String>,

    #[serde(default, alias = "time", alias = "asctime")]
    timestamp: Option<String>,
}

static LEVEL_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_level_regex() -> &'static Regex {
    LEVEL_REGEX.get_or_init(|| {
        Regex::new(r"\b(DEBUG|INFO|WARNING|WARN|ERROR|CRITICAL)\b").unwrap()
    })
}

/// Parse one line from an event source.
///
/// JSON objects carry `level`, `message` and an optional `timestamp`.
/// Anything else is treated as plain text: the level is the first standalone
/// level token (INFO if none) and the whole trimmed line is the message.
/// Blank lines yield `Ok(None)`.
pub fn parse_event_line(line: &str) -> Result<Option<LogEvent>, IngestionError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.starts_with('{') {
        if let Ok(wire) = serde_json::from_str::<WireEvent>(trimmed) {
            return from_wire(wire).map(Some);
        }
    }

    Ok(Some(from_plain(trimmed)))
}

fn from_wire(wire: WireEvent) -> Result<LogEvent, IngestionError> {
    let message = wire
        .message
        .ok_or_else(|| IngestionError::Parse("JSON event has no message field".to_string()))?;

    let level = match wire.level.as_deref() {
        None => LogLevel::Info,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            debug!(error = %e, "Unknown level in event, using INFO");
            LogLevel::Info
        }),
    };

    Ok(LogEvent {
        level,
        message,
        timestamp: wire.timestamp,
    })
}

fn from_plain(line: &str) -> LogEvent {
    let level = get_level_regex()
        .find(line)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(LogLevel::Info);
    LogEvent::new(level, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_event() {
        let event = parse_event_line(
            r#"{"level": "WARNING", "message": "Failed to parse x", "timestamp": "2024-01-01T10:15:30Z"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.level, LogLevel::Warning);
        assert_eq!(event.message, "Failed to parse x");
        assert_eq!(event.timestamp.as_deref(), Some("2024-01-01T10:15:30Z"));
    }

    #[test]
    fn test_json_aliases() {
        let event = parse_event_line(
            r#"{"levelname": "error", "msg": "boom", "asctime": "2024-01-01 10:15:30,123", "name": "parser"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.message, "boom");
        assert_eq!(event.timestamp.as_deref(), Some("2024-01-01 10:15:30,123"));
    }

    #[test]
    fn test_json_time_alias() {
        let event = parse_event_line(r#"{"level": "INFO", "message": "COMPLETED", "time": "2024-01-01T08:00:00+02:00"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.timestamp.as_deref(), Some("2024-01-01T08:00:00+02:00"));
    }

    #[test]
    fn test_json_unknown_level_defaults_to_info() {
        let event = parse_event_line(r#"{"level": "NOTICE", "message": "hi"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn test_json_without_message_is_error() {
        let err = parse_event_line(r#"{"level": "INFO"}"#).unwrap_err();
        assert!(matches!(err, IngestionError::Parse(_)));
    }

    #[test]
    fn test_plain_text_level_detection() {
        let event = parse_event_line("2024-01-01 10:00:00 - parser - ERROR - Failed to parse x")
            .unwrap()
            .unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.message, "2024-01-01 10:00:00 - parser - ERROR - Failed to parse x");

        let event = parse_event_line("  Phase 1 started  ").unwrap().unwrap();
        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.message, "Phase 1 started");
    }

    #[test]
    fn test_broken_json_is_plain_text() {
        let event = parse_event_line(r#"{"level": "ERROR", "message": "#).unwrap().unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert!(event.message.starts_with('{'));
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert!(parse_event_line("").unwrap().is_none());
        assert!(parse_event_line("   \t").unwrap().is_none());
    }
}
