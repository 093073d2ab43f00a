//! Plain-text summaries for the command-line modes.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{TimeZone, Utc};

use crate::activity::{truncate, ActivityEvent, EventStatus, EventType};

const RECENT_ERRORS: usize = 5;
const RECENT_EVENTS: usize = 10;

fn clock_time(ts: i64) -> String {
    match Utc.timestamp_millis_opt(ts).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

fn count_by<'a, I, F>(events: I, key: F) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a ActivityEvent>,
    F: Fn(&ActivityEvent) -> String,
{
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(key(event)).or_insert(0) += 1;
    }
    counts
}

/// Summary of one day's gateway log, events in file order.
pub fn log_summary(date: &str, events: &[ActivityEvent]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Activity summary for {date}");
    let _ = writeln!(out, "{}", "-".repeat(50));

    let _ = writeln!(out, "\nBy type:");
    for (kind, count) in count_by(events, |e| e.event_type.to_string()) {
        let _ = writeln!(out, "  {kind}: {count}");
    }

    let errors: Vec<&ActivityEvent> = events
        .iter()
        .filter(|e| e.status == EventStatus::Error)
        .collect();
    if !errors.is_empty() {
        let _ = writeln!(out, "\nRecent errors ({} total):", errors.len());
        let skip = errors.len().saturating_sub(RECENT_ERRORS);
        for e in &errors[skip..] {
            let message = e.message.as_deref().map(|m| truncate(m, 80)).unwrap_or_default();
            let _ = writeln!(out, "  [{}] {}: {}", clock_time(e.ts), e.action, message);
        }
    }

    let tools: Vec<&ActivityEvent> = events
        .iter()
        .filter(|e| e.event_type == EventType::Tool)
        .collect();
    if !tools.is_empty() {
        let _ = writeln!(out, "\nTool activity ({} total):", tools.len());
        let mut by_action: Vec<(String, usize)> =
            count_by(tools.iter().copied(), |e| e.action.clone()).into_iter().collect();
        by_action.sort_by(|a, b| b.1.cmp(&a.1));
        for (action, count) in by_action {
            let _ = writeln!(out, "  {action}: {count}");
        }
    }
    out
}

/// Summary of a newest-first transcript scan.
pub fn transcript_summary(events: &[ActivityEvent]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Activity feed ({} events)", events.len());

    let _ = writeln!(out, "\nBy type:");
    for (kind, count) in count_by(events, |e| e.event_type.to_string()) {
        let _ = writeln!(out, "  {kind}: {count}");
    }

    let tools = events.iter().filter(|e| e.event_type == EventType::Tool);
    let by_action = count_by(tools, |e| e.action.clone());
    if !by_action.is_empty() {
        let _ = writeln!(out, "\nTool actions:");
        for (action, count) in by_action {
            let _ = writeln!(out, "  {action}: {count}");
        }
    }

    let _ = writeln!(out, "\nRecent events:");
    for e in events.iter().take(RECENT_EVENTS) {
        let _ = writeln!(
            out,
            "  [{}] {:<7} {}:{} ({})",
            clock_time(e.ts),
            e.status.as_str(),
            e.event_type,
            e.action,
            e.agent_id.as_deref().unwrap_or("-")
        );
    }
    out
}
