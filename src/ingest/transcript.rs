use std::fs;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::activity::{now_ms, parse_timestamp, ActivityEvent, EventStatus, EventType, Tokens};

/// Classify one transcript record (a conversational turn).
///
/// Only `message` records are considered. Each `toolCall` content item yields
/// a `tool`/`start` event, each `toolResult` a `tool`/`result` event, and an
/// assistant turn carrying usage statistics yields one `model`/`usage` event.
pub fn classify_record(line: &str, agent_id: &str, session_id: &str) -> Vec<ActivityEvent> {
    let mut events = Vec::new();

    let obj: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => return events,
    };

    if obj.get("type").and_then(|v| v.as_str()) != Some("message") {
        return events;
    }
    let message = match obj.get("message") {
        Some(m) if m.is_object() => m,
        _ => return events,
    };

    let ts = obj
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)
        .unwrap_or_else(now_ms);

    if let Some(content) = message.get("content").and_then(|v| v.as_array()) {
        for item in content {
            match item.get("type").and_then(|v| v.as_str()) {
                Some("toolCall") => {
                    let name = match item.get("name").and_then(|v| v.as_str()) {
                        Some(n) if !n.is_empty() => n,
                        _ => continue,
                    };
                    let event = ActivityEvent::new(ts, EventType::Tool, name, EventStatus::Start)
                        .with_source_id(item.get("id").and_then(|v| v.as_str()))
                        .with_params(item.get("arguments"))
                        .with_session(agent_id, session_id);
                    events.push(event);
                }
                Some("toolResult") => {
                    let failed = item
                        .get("isError")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    let status = if failed {
                        EventStatus::Error
                    } else {
                        EventStatus::Success
                    };
                    let mut event = ActivityEvent::new(ts, EventType::Tool, "result", status)
                        .with_source_id(item.get("toolCallId").and_then(|v| v.as_str()))
                        .with_session(agent_id, session_id);
                    match item.get("content") {
                        Some(Value::String(text)) => event = event.with_result(text),
                        Some(other) => event = event.with_result(&other.to_string()),
                        None => {}
                    }
                    events.push(event);
                }
                _ => {}
            }
        }
    }

    let role = message.get("role").and_then(|v| v.as_str());
    if let (Some("assistant"), Some(usage)) = (role, message.get("usage")) {
        if !usage.is_null() {
            events.push(usage_event(ts, message, usage, agent_id, session_id));
        }
    }

    events
}

fn usage_event(
    ts: i64,
    message: &Value,
    usage: &Value,
    agent_id: &str,
    session_id: &str,
) -> ActivityEvent {
    let count = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
    let mut event = ActivityEvent::new(ts, EventType::Model, "usage", EventStatus::Info)
        .with_session(agent_id, session_id);
    event.id = format!("model-{ts}");
    event.model = message
        .get("model")
        .and_then(|v| v.as_str())
        .map(String::from);
    event.tokens = Some(Tokens {
        input: count("input"),
        output: count("output"),
        total: count("totalTokens"),
    });
    event.cost = usage.pointer("/cost/total").and_then(|v| v.as_f64());
    event
}

/// Parse all events from a transcript file. The session id is the file stem.
pub fn parse_transcript_file(path: &Path, agent_id: &str) -> Vec<ActivityEvent> {
    let mut events = Vec::new();
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return events,
    };
    let session_id = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    for line in super::lossy_lines(BufReader::new(file)) {
        events.extend(classify_record(&line, agent_id, &session_id));
    }
    events
}
