//! Log events and the per-event record shipped to the collector.
//!
//! A [`LogEvent`] is what producers hand to the forwarder. Before it enters
//! the queue it is turned into a [`LogRecord`]: the message is sanitized, the
//! source stream is mapped to a severity label and the reported hostname is
//! resolved. The record is what ends up inside the `{"logs": [...]}` body.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "timestamp": 1700000000,
//!   "message": "GET /health 200",
//!   "container": {"name": "web", "id": "3f2a", "pid": 4242, "image": "nginx:1.25"},
//!   "level": "INFO",
//!   "hostname": "node-1"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::TRUNCATION_MARKER;

/// Process metadata attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub image: String,
}

/// One log occurrence, as produced by the ingestion side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    /// Output stream the line was read from, e.g. `stdout` or `stderr`.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub container: ContainerInfo,
    /// Hostname of the originating container. Used unless an override is configured.
    #[serde(default)]
    pub hostname: String,
    /// Capture time in unix seconds.
    #[serde(default = "unix_now")]
    pub timestamp: i64,
}

impl LogEvent {
    /// Creates an event captured now.
    pub fn new(
        message: impl Into<String>,
        source: impl Into<String>,
        container: ContainerInfo,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
            container,
            hostname: hostname.into(),
            timestamp: unix_now(),
        }
    }
}

/// Per-event record inside the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: i64,
    pub message: String,
    pub container: ContainerInfo,
    pub level: String,
    pub hostname: String,
}

impl LogRecord {
    /// Builds the record for `event`, truncating its message to
    /// `max_line_length` bytes and applying the hostname override.
    #[must_use]
    pub fn from_event(
        event: LogEvent,
        max_line_length: usize,
        hostname_override: Option<&str>,
    ) -> Self {
        let LogEvent {
            message,
            source,
            container,
            hostname,
            timestamp,
        } = event;

        let message = if message.len() > max_line_length {
            sanitize(&message, max_line_length).into_owned()
        } else {
            message
        };

        LogRecord {
            timestamp,
            message,
            container,
            level: classify_level(&source).to_string(),
            hostname: resolve_host(hostname_override, &hostname).to_string(),
        }
    }
}

/// Request body: `{"logs": [...]}`.
#[derive(Debug, Serialize)]
pub struct LogsPayload<'a> {
    pub logs: &'a [LogRecord],
}

/// Returns `message` unchanged when it fits in `max_length` bytes, otherwise
/// its first `max_length` bytes followed by [`TRUNCATION_MARKER`].
///
/// The cut never splits a UTF-8 character: if byte `max_length` falls inside
/// one, the cut moves back to the start of that character.
#[must_use]
pub fn sanitize(message: &str, max_length: usize) -> Cow<'_, str> {
    if message.len() <= max_length {
        return Cow::Borrowed(message);
    }

    let mut cut = max_length;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
    truncated.push_str(&message[..cut]);
    truncated.push_str(TRUNCATION_MARKER);
    Cow::Owned(truncated)
}

/// Maps an output stream to a severity label. Unknown streams are unclassified.
#[must_use]
pub fn classify_level(source: &str) -> &'static str {
    match source {
        "stdout" => "INFO",
        "stderr" => "ERROR",
        _ => "",
    }
}

/// The configured override when it is non-empty, otherwise `fallback`.
#[must_use]
pub fn resolve_host<'a>(hostname_override: Option<&'a str>, fallback: &'a str) -> &'a str {
    match hostname_override {
        Some(host) if !host.is_empty() => host,
        _ => fallback,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn container() -> ContainerInfo {
        ContainerInfo {
            name: "web".to_string(),
            id: "3f2a".to_string(),
            pid: 4242,
            image: "nginx:1.25".to_string(),
        }
    }

    #[test]
    fn test_sanitize_short_message_unchanged() {
        let result = sanitize("hello", 10);
        assert!(matches!(result, Cow::Borrowed("hello")));
    }

    #[test]
    fn test_sanitize_exact_length_unchanged() {
        assert_eq!(sanitize("0123456789", 10), "0123456789");
    }

    #[test]
    fn test_sanitize_truncates_with_marker() {
        assert_eq!(
            sanitize("0123456789abc", 10),
            "0123456789 (cut off, too long...)"
        );
    }

    #[test]
    fn test_sanitize_zero_length() {
        assert_eq!(sanitize("abc", 0), " (cut off, too long...)");
    }

    #[test]
    fn test_sanitize_respects_char_boundary() {
        // 'é' is two bytes, byte 2 sits in the middle of it
        let result = sanitize("aéb", 2);
        assert_eq!(result, format!("a{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_classify_level() {
        assert_eq!(classify_level("stdout"), "INFO");
        assert_eq!(classify_level("stderr"), "ERROR");
        assert_eq!(classify_level("syslog"), "");
        assert_eq!(classify_level(""), "");
    }

    #[test]
    fn test_resolve_host() {
        assert_eq!(resolve_host(Some("override"), "container"), "override");
        assert_eq!(resolve_host(Some(""), "container"), "container");
        assert_eq!(resolve_host(None, "container"), "container");
    }

    #[test]
    fn test_record_from_event() {
        let mut event = LogEvent::new("x".repeat(20), "stderr", container(), "c-host");
        event.timestamp = 1_700_000_000;

        let record = LogRecord::from_event(event, 5, Some("node-1"));

        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.message, format!("xxxxx{TRUNCATION_MARKER}"));
        assert_eq!(record.level, "ERROR");
        assert_eq!(record.hostname, "node-1");
        assert_eq!(record.container, container());
    }

    #[test]
    fn test_record_wire_format() {
        let mut event = LogEvent::new("GET /health 200", "stdout", container(), "c-host");
        event.timestamp = 1_700_000_000;
        let record = LogRecord::from_event(event, 100, None);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "timestamp": 1_700_000_000,
                "message": "GET /health 200",
                "container": {"name": "web", "id": "3f2a", "pid": 4242, "image": "nginx:1.25"},
                "level": "INFO",
                "hostname": "c-host",
            })
        );
    }

    #[test]
    fn test_payload_wraps_records_in_logs() {
        let record = LogRecord::from_event(LogEvent::new("m", "", container(), "h"), 100, None);
        let body = serde_json::to_value(LogsPayload {
            logs: std::slice::from_ref(&record),
        })
        .unwrap();

        assert_eq!(body["logs"].as_array().unwrap().len(), 1);
        assert_eq!(body["logs"][0]["level"], "");
    }

    #[test]
    fn test_event_deserialize_fills_defaults() {
        let event: LogEvent = serde_json::from_str(r#"{"message":"only a message"}"#).unwrap();
        assert_eq!(event.message, "only a message");
        assert_eq!(event.source, "");
        assert_eq!(event.container, ContainerInfo::default());
        assert!(event.timestamp > 0);
    }

    proptest! {
        #[test]
        fn prop_sanitize_ascii_is_exact(message in "[ -~]{0,200}", max in 0usize..150) {
            let result = sanitize(&message, max);
            if message.len() <= max {
                prop_assert_eq!(&*result, message.as_str());
            } else {
                prop_assert_eq!(result.len(), max + TRUNCATION_MARKER.len());
                prop_assert!(result.starts_with(&message[..max]));
                prop_assert!(result.ends_with(TRUNCATION_MARKER));
            }
        }

        #[test]
        fn prop_sanitize_never_exceeds_bound(message in "\\PC{0,100}", max in 0usize..120) {
            let result = sanitize(&message, max);
            prop_assert!(result.len() <= max.max(message.len()) + TRUNCATION_MARKER.len());
        }
    }
}
