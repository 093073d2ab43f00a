use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bound for tool details, error messages, tool results and serialized params.
pub const LONG_TEXT: usize = 500;
/// Bound for subsystem message payloads.
pub const MEDIUM_TEXT: usize = 300;
/// Bound for usage and session messages.
pub const SHORT_TEXT: usize = 200;

/// Kind of activity an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Tool,
    Model,
    Message,
    Session,
    Error,
    Command,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Tool => "tool",
            EventType::Model => "model",
            EventType::Message => "message",
            EventType::Session => "session",
            EventType::Error => "error",
            EventType::Command => "command",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Start,
    Success,
    Error,
    Info,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Start => "start",
            EventStatus::Success => "success",
            EventStatus::Error => "error",
            EventStatus::Info => "info",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counts reported by a model usage record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// A normalized activity record produced by classification.
///
/// Events are immutable once built. `id` is only best-effort unique: it is
/// taken from a stable source identifier when one exists and otherwise
/// synthesized from the timestamp plus a short random suffix, so two
/// processes may in principle produce the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub ts: i64,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub action: String,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Tokens>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl ActivityEvent {
    /// Create an event with a synthesized id and no payload.
    pub fn new(
        ts: i64,
        event_type: EventType,
        action: impl Into<String>,
        status: EventStatus,
    ) -> Self {
        Self {
            ts,
            id: synthesize_id(ts),
            session_key: None,
            session_id: None,
            agent_id: None,
            event_type,
            action: action.into(),
            status,
            message: None,
            params: None,
            result: None,
            duration_ms: None,
            model: None,
            tokens: None,
            cost: None,
        }
    }

    /// Replace the synthesized id with a source identifier, if one is given.
    pub fn with_source_id(mut self, id: Option<&str>) -> Self {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            self.id = id.to_string();
        }
        self
    }

    /// Attach a message truncated to `max` characters. Empty text is dropped.
    pub fn with_message(mut self, text: &str, max: usize) -> Self {
        if !text.is_empty() {
            self.message = Some(truncate(text, max));
        }
        self
    }

    /// Attach tool arguments. Arguments whose JSON form exceeds the long-text
    /// bound are replaced by their truncated serialization.
    pub fn with_params(mut self, params: Option<&Value>) -> Self {
        self.params = params.map(|value| {
            let encoded = value.to_string();
            if encoded.chars().count() > LONG_TEXT {
                Value::String(truncate(&encoded, LONG_TEXT))
            } else {
                value.clone()
            }
        });
        self
    }

    pub fn with_result(mut self, text: &str) -> Self {
        self.result = Some(truncate(text, LONG_TEXT));
        self
    }

    pub fn with_session(mut self, agent_id: &str, session_id: &str) -> Self {
        self.agent_id = Some(agent_id.to_string());
        self.session_id = Some(session_id.to_string());
        self
    }
}

/// Synthesize a non-authoritative id of the form `<ts>-<suffix>`.
pub fn synthesize_id(ts: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{ts}-{}", &suffix[..6])
}

/// Truncate to at most `max` characters without splitting a character.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an ISO-8601 timestamp into epoch milliseconds.
/// Zone-less timestamps and bare dates are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_synthesized_id_shape() {
        let id = synthesize_id(1_700_000_000_000);
        let (ts, suffix) = id.split_once('-').unwrap();
        assert_eq!(ts, "1700000000000");
        assert_eq!(suffix.len(), 6);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(1_704_067_200_000));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.500Z"), Some(1_704_067_200_500));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00"), Some(1_704_067_200_000));
        assert_eq!(parse_timestamp("2024-01-01"), Some(1_704_067_200_000));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_empty() {
        let mut event = ActivityEvent::new(5, EventType::Model, "usage", EventStatus::Info)
            .with_source_id(Some("model-5"));
        event.tokens = Some(Tokens { input: 1, output: 2, total: 3 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "model");
        assert_eq!(json["status"], "info");
        assert_eq!(json["tokens"]["total"], 3);
        assert!(json.get("message").is_none());
        assert!(json.get("sessionKey").is_none());
    }

    #[test]
    fn test_oversized_params_become_truncated_text() {
        let big = serde_json::json!({ "command": "x".repeat(600) });
        let event = ActivityEvent::new(1, EventType::Tool, "exec", EventStatus::Start)
            .with_params(Some(&big));
        match event.params {
            Some(Value::String(s)) => assert_eq!(s.chars().count(), LONG_TEXT),
            other => panic!("expected truncated string, got {other:?}"),
        }
    }
}
