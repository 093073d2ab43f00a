use std::fs;
use std::io::BufReader;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::activity::{
    now_ms, parse_timestamp, ActivityEvent, EventStatus, EventType, LONG_TEXT, MEDIUM_TEXT,
    SHORT_TEXT,
};

static TOOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[tools\]\s+(\w+)\s+(failed|succeeded)?:?\s*(.*)").expect("tool regex")
});
static AGENT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"agent:[\w:-]+").expect("agent key regex"));
static ERROR_ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(\w+)\]|(\w+)\s+failed").expect("error action regex"));
static SUBSYSTEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"subsystem.*?([\w/]+)").expect("subsystem regex"));

/// Which rule set applies to a gateway log line.
///
/// Batch parsing of whole log files has no usage rule (transcripts carry the
/// real usage records) and uses looser session/error/subsystem rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    Batch,
}

/// The fields of a gateway log record that classification looks at.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// Key `"0"`, falling back to key `"1"`.
    pub message: String,
    /// Key `"1"`, when present and non-empty.
    pub secondary: Option<String>,
    pub ts: i64,
    pub level: String,
    /// `_meta.name`, the logger descriptor naming the subsystem.
    pub logger: Option<String>,
}

impl LogLine {
    /// Parse a raw line. Anything that is not a JSON object yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let obj: Value = serde_json::from_str(raw).ok()?;
        let obj = obj.as_object()?;

        let text = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let secondary = text("1");
        let message = text("0").or_else(|| secondary.clone()).unwrap_or_default();

        let ts = obj
            .get("time")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
            .unwrap_or_else(now_ms);

        let meta = obj.get("_meta");
        let level = meta
            .and_then(|m| m.get("logLevelName"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("INFO")
            .to_string();
        let logger = meta
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .map(String::from);

        Some(Self {
            message,
            secondary,
            ts,
            level,
            logger,
        })
    }

    fn is_error(&self) -> bool {
        self.level == "ERROR"
    }
}

/// A named classification rule. Rules are tried in table order and the first
/// one returning an event wins.
pub struct Rule {
    pub name: &'static str,
    apply: fn(&LogLine) -> Option<ActivityEvent>,
}

static LIVE_RULES: &[Rule] = &[
    Rule { name: "tool", apply: tool_invocation },
    Rule { name: "usage", apply: model_usage },
    Rule { name: "session", apply: session_state },
    Rule { name: "error", apply: error_entry },
    Rule { name: "subsystem", apply: subsystem_message },
];

static BATCH_RULES: &[Rule] = &[
    Rule { name: "tool", apply: tool_invocation },
    Rule { name: "session", apply: session_mention },
    Rule { name: "error", apply: plain_error },
    Rule { name: "subsystem", apply: subsystem_fallback },
];

/// The ordered rule table for a mode.
pub fn rules(mode: GatewayMode) -> &'static [Rule] {
    match mode {
        GatewayMode::Live => LIVE_RULES,
        GatewayMode::Batch => BATCH_RULES,
    }
}

/// Classify a parsed line, returning the winning rule's name and its event.
pub fn apply_rules(line: &LogLine, mode: GatewayMode) -> Option<(&'static str, ActivityEvent)> {
    rules(mode)
        .iter()
        .find_map(|rule| (rule.apply)(line).map(|event| (rule.name, event)))
}

/// Classify a raw gateway log line. Malformed lines and misses yield `None`.
pub fn classify_line(raw: &str, mode: GatewayMode) -> Option<ActivityEvent> {
    let line = LogLine::parse(raw)?;
    apply_rules(&line, mode).map(|(_, event)| event)
}

/// `[tools] <action> <succeeded|failed>: <detail>`
fn tool_invocation(line: &LogLine) -> Option<ActivityEvent> {
    let caps = TOOL_RE.captures(&line.message)?;
    let action = caps.get(1)?.as_str().to_lowercase();
    let failed = caps
        .get(2)
        .is_some_and(|word| word.as_str().eq_ignore_ascii_case("failed"));
    let status = if failed {
        EventStatus::Error
    } else {
        EventStatus::Success
    };
    let detail = caps.get(3).map_or("", |m| m.as_str());
    Some(ActivityEvent::new(line.ts, EventType::Tool, action, status).with_message(detail, LONG_TEXT))
}

// Token counts are not extracted here; the event only flags that usage was logged.
fn model_usage(line: &LogLine) -> Option<ActivityEvent> {
    let msg = &line.message;
    if !(msg.contains("model.usage") || msg.contains("tokens")) {
        return None;
    }
    Some(
        ActivityEvent::new(line.ts, EventType::Model, "usage", EventStatus::Info)
            .with_message(msg, SHORT_TEXT),
    )
}

fn session_state(line: &LogLine) -> Option<ActivityEvent> {
    let msg = &line.message;
    if !(msg.contains("Session") || msg.contains("session")) {
        return None;
    }
    let key = AGENT_KEY_RE.find(msg)?;
    let mut event = ActivityEvent::new(line.ts, EventType::Session, "state", EventStatus::Info)
        .with_message(msg, SHORT_TEXT);
    event.session_key = Some(key.as_str().to_string());
    Some(event)
}

fn session_mention(line: &LogLine) -> Option<ActivityEvent> {
    let msg = &line.message;
    if !(msg.contains("Session store") || msg.contains("session")) {
        return None;
    }
    let mut event = ActivityEvent::new(line.ts, EventType::Session, "state", EventStatus::Info)
        .with_message(msg, SHORT_TEXT);
    event.session_key = AGENT_KEY_RE.find(msg).map(|m| m.as_str().to_string());
    Some(event)
}

fn error_entry(line: &LogLine) -> Option<ActivityEvent> {
    if !line.is_error() {
        return None;
    }
    let action = ERROR_ACTION_RE
        .captures(&line.message)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map_or("error", |m| m.as_str());
    Some(
        ActivityEvent::new(line.ts, EventType::Error, action, EventStatus::Error)
            .with_message(&line.message, LONG_TEXT),
    )
}

fn plain_error(line: &LogLine) -> Option<ActivityEvent> {
    if !line.is_error() {
        return None;
    }
    Some(
        ActivityEvent::new(line.ts, EventType::Error, "error", EventStatus::Error)
            .with_message(&line.message, LONG_TEXT),
    )
}

fn subsystem_name(line: &LogLine) -> Option<String> {
    let logger = line.logger.as_deref()?;
    let caps = SUBSYSTEM_RE.captures(logger)?;
    let name: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"') && !c.is_whitespace())
        .collect();
    Some(name)
}

fn subsystem_status(line: &LogLine) -> EventStatus {
    if line.is_error() {
        EventStatus::Error
    } else {
        EventStatus::Info
    }
}

fn subsystem_message(line: &LogLine) -> Option<ActivityEvent> {
    let secondary = line.secondary.as_deref()?;
    if line.message.is_empty() {
        return None;
    }
    let action = subsystem_name(line)?;
    Some(
        ActivityEvent::new(line.ts, EventType::Message, action, subsystem_status(line))
            .with_message(secondary, MEDIUM_TEXT),
    )
}

fn subsystem_fallback(line: &LogLine) -> Option<ActivityEvent> {
    if line.message.is_empty() {
        return None;
    }
    let action = subsystem_name(line)?;
    let text = line.secondary.as_deref().unwrap_or(&line.message);
    Some(
        ActivityEvent::new(line.ts, EventType::Message, action, subsystem_status(line))
            .with_message(text, MEDIUM_TEXT),
    )
}

/// Classify every line of a gateway log file with the batch rules.
/// A missing or unreadable file yields no events.
pub fn parse_log_file(path: &Path) -> Vec<ActivityEvent> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "cannot open gateway log");
            return Vec::new();
        }
    };
    super::lossy_lines(BufReader::new(file))
        .filter_map(|line| classify_line(&line, GatewayMode::Batch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn live(raw: &str) -> Option<ActivityEvent> {
        classify_line(raw, GatewayMode::Live)
    }

    fn rule_name(raw: &str, mode: GatewayMode) -> Option<&'static str> {
        LogLine::parse(raw).and_then(|line| apply_rules(&line, mode).map(|(name, _)| name))
    }

    #[test]
    fn test_tool_success() {
        let event =
            live(r#"{"0":"[tools] exec succeeded: ran script","time":"2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(event.event_type, EventType::Tool);
        assert_eq!(event.action, "exec");
        assert_eq!(event.status, EventStatus::Success);
        assert_eq!(event.message.as_deref(), Some("ran script"));
        assert_eq!(event.ts, 1_704_067_200_000);
    }

    #[test]
    fn test_tool_rule_beats_error_level() {
        let raw = r#"{"0":"[tools] write failed: disk full","_meta":{"logLevelName":"ERROR"}}"#;
        let event = live(raw).unwrap();
        assert_eq!(event.event_type, EventType::Tool);
        assert_eq!(event.action, "write");
        assert_eq!(event.status, EventStatus::Error);
        assert_eq!(rule_name(raw, GatewayMode::Live), Some("tool"));
    }

    #[test]
    fn test_tool_action_lowercased_and_failed_case_insensitive() {
        let event = live(r#"{"0":"[TOOLS] Browser FAILED: timeout"}"#).unwrap();
        assert_eq!(event.action, "browser");
        assert_eq!(event.status, EventStatus::Error);
    }

    #[test]
    fn test_tool_without_result_word_is_success() {
        let event = live(r#"{"0":"[tools] read : src/main.rs"}"#).unwrap();
        assert_eq!(event.action, "read");
        assert_eq!(event.status, EventStatus::Success);
        assert_eq!(event.message.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn test_tool_detail_truncated() {
        let raw = format!(r#"{{"0":"[tools] exec succeeded: {}"}}"#, "a".repeat(800));
        let event = live(&raw).unwrap();
        assert_eq!(event.message.unwrap().len(), LONG_TEXT);
    }

    #[test]
    fn test_message_falls_back_to_second_key() {
        let event = live(r#"{"1":"[tools] edit succeeded: ok"}"#).unwrap();
        assert_eq!(event.action, "edit");
    }

    #[test]
    fn test_usage_only_in_live_mode() {
        let raw = r#"{"0":"run complete: 1200 tokens in 3s"}"#;
        let event = live(raw).unwrap();
        assert_eq!(event.event_type, EventType::Model);
        assert_eq!(event.action, "usage");
        assert_eq!(event.status, EventStatus::Info);
        assert!(event.tokens.is_none());
        assert!(classify_line(raw, GatewayMode::Batch).is_none());
    }

    #[test]
    fn test_session_state_requires_agent_key_live() {
        let event = live(r#"{"0":"Session updated for agent:main:telegram-42"}"#).unwrap();
        assert_eq!(event.event_type, EventType::Session);
        assert_eq!(event.action, "state");
        assert_eq!(event.session_key.as_deref(), Some("agent:main:telegram-42"));

        assert!(live(r#"{"0":"session pruned"}"#).is_none());
    }

    #[test]
    fn test_session_mention_batch_without_key() {
        let event = classify_line(r#"{"0":"session pruned"}"#, GatewayMode::Batch).unwrap();
        assert_eq!(event.event_type, EventType::Session);
        assert!(event.session_key.is_none());
    }

    #[test]
    fn test_error_action_extraction() {
        let tagged = live(r#"{"0":"[telegram] poll crashed","_meta":{"logLevelName":"ERROR"}}"#)
            .unwrap();
        assert_eq!(tagged.event_type, EventType::Error);
        assert_eq!(tagged.action, "telegram");
        assert_eq!(tagged.status, EventStatus::Error);

        let phrase =
            live(r#"{"0":"upload failed after retry","_meta":{"logLevelName":"ERROR"}}"#).unwrap();
        assert_eq!(phrase.action, "upload");

        let bare = live(r#"{"0":"boom","_meta":{"logLevelName":"ERROR"}}"#).unwrap();
        assert_eq!(bare.action, "error");

        let batch = classify_line(
            r#"{"0":"[telegram] poll crashed","_meta":{"logLevelName":"ERROR"}}"#,
            GatewayMode::Batch,
        )
        .unwrap();
        assert_eq!(batch.action, "error");
    }

    #[test]
    fn test_subsystem_message() {
        let raw = r#"{"0":"{\"subsystem\":\"telegram\"}","1":"delivered reply","_meta":{"logLevelName":"INFO","name":"{\"subsystem\":\"telegram\"}"}}"#;
        let event = live(raw).unwrap();
        assert_eq!(event.event_type, EventType::Message);
        assert_eq!(event.action, "telegram");
        assert_eq!(event.status, EventStatus::Info);
        assert_eq!(event.message.as_deref(), Some("delivered reply"));
    }

    #[test]
    fn test_subsystem_needs_secondary_in_live_mode() {
        let raw = r#"{"0":"hello","_meta":{"name":"subsystem gateway/ws"}}"#;
        assert!(live(raw).is_none());
        let event = classify_line(raw, GatewayMode::Batch).unwrap();
        assert_eq!(event.action, "gateway/ws");
        assert_eq!(event.message.as_deref(), Some("hello"));
    }

    #[test]
    fn test_misses_and_garbage() {
        assert!(live(r#"{"0":"nothing interesting"}"#).is_none());
        assert!(live("not json at all").is_none());
        assert!(live("").is_none());
        assert!(live("[1,2,3]").is_none());
        assert!(live("\u{0}\u{1}{{{").is_none());
        assert!(live(r#"{"0":42,"_meta":"weird"}"#).is_none());
    }

    #[test]
    fn test_missing_time_uses_ingestion_time() {
        let before = now_ms();
        let event = live(r#"{"0":"[tools] exec succeeded: x"}"#).unwrap();
        assert!(event.ts >= before);
    }

    #[test]
    fn test_reclassification_is_structurally_identical() {
        let raw = r#"{"0":"[tools] exec succeeded: ran","time":"2024-01-01T00:00:00Z"}"#;
        let mut a = live(raw).unwrap();
        let mut b = live(raw).unwrap();
        a.id.clear();
        b.id.clear();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rule_tables_keep_order() {
        let live_names: Vec<_> = rules(GatewayMode::Live).iter().map(|r| r.name).collect();
        assert_eq!(live_names, ["tool", "usage", "session", "error", "subsystem"]);
        let batch_names: Vec<_> = rules(GatewayMode::Batch).iter().map(|r| r.name).collect();
        assert_eq!(batch_names, ["tool", "session", "error", "subsystem"]);
    }

    #[test]
    fn test_parse_log_file_uses_batch_rules() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"0":"[tools] exec succeeded: ok"}}"#).unwrap();
        writeln!(tmp, r#"{{"0":"used 50 tokens"}}"#).unwrap();
        writeln!(tmp, "garbage").unwrap();
        writeln!(tmp, r#"{{"0":"oops","_meta":{{"logLevelName":"ERROR"}}}}"#).unwrap();
        tmp.flush().unwrap();

        let events = parse_log_file(tmp.path());
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, [EventType::Tool, EventType::Error]);
    }

    #[test]
    fn test_parse_log_file_reads_past_invalid_utf8() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"0":"[tools] exec succeeded: ok"}}"#).unwrap();
        tmp.write_all(b"\xff garbage\n").unwrap();
        writeln!(tmp, r#"{{"0":"[tools] read failed: gone"}}"#).unwrap();
        tmp.flush().unwrap();

        let events = parse_log_file(tmp.path());
        let actions: Vec<_> = events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["exec", "read"]);
    }
}
