use std::fs;
use std::path::{Path, PathBuf};

use crate::activity::{ActivityEvent, EventStatus, EventType};

/// Create a bare event.
pub fn event(ts: i64, event_type: EventType, action: &str, status: EventStatus) -> ActivityEvent {
    ActivityEvent::new(ts, event_type, action, status)
}

/// Create an event attributed to an agent session.
pub fn agent_event(ts: i64, agent: &str, action: &str, status: EventStatus) -> ActivityEvent {
    event(ts, EventType::Tool, action, status).with_session(agent, "s1")
}

/// Transcript record with one tool call.
pub fn tool_call_record(timestamp: &str, id: &str, name: &str) -> String {
    format!(
        r#"{{"type":"message","timestamp":"{timestamp}","message":{{"role":"assistant","content":[{{"type":"toolCall","id":"{id}","name":"{name}","arguments":{{}}}}]}}}}"#
    )
}

/// Transcript record with one tool result.
pub fn tool_result_record(timestamp: &str, call_id: &str, is_error: bool, content: &str) -> String {
    format!(
        r#"{{"type":"message","timestamp":"{timestamp}","message":{{"role":"toolResult","content":[{{"type":"toolResult","toolCallId":"{call_id}","isError":{is_error},"content":"{content}"}}]}}}}"#
    )
}

/// Assistant record carrying usage statistics.
pub fn usage_record(timestamp: &str, model: &str, total_tokens: u64, cost: f64) -> String {
    format!(
        r#"{{"type":"message","timestamp":"{timestamp}","message":{{"role":"assistant","model":"{model}","content":[],"usage":{{"input":{total_tokens},"output":0,"totalTokens":{total_tokens},"cost":{{"total":{cost}}}}}}}}}"#
    )
}

/// Write `<root>/agents/<agent>/sessions/<session>.jsonl`.
pub fn write_session(root: &Path, agent: &str, session: &str, lines: &[String]) -> PathBuf {
    let dir = root.join("agents").join(agent).join("sessions");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{session}.jsonl"));
    fs::write(&path, lines.join("\n")).unwrap();
    path
}
