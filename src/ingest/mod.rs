pub mod gateway;
pub mod transcript;

use std::io::BufRead;

use crate::activity::ActivityEvent;

pub use gateway::GatewayMode;

/// Where a raw line came from, plus the correlation ids it cannot carry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Gateway log line read by the live tailer.
    GatewayLive,
    /// Gateway log line read from a whole log file.
    GatewayBatch,
    /// Session transcript record.
    Transcript { agent_id: String, session_id: String },
}

/// Classify a raw line into zero or more activity events.
///
/// Never fails: malformed input and lines no rule recognises produce an empty
/// vec. Gateway lines yield at most one event; a transcript record may yield
/// several.
pub fn classify(raw: &str, source: &SourceKind) -> Vec<ActivityEvent> {
    match source {
        SourceKind::GatewayLive => gateway::classify_line(raw, GatewayMode::Live)
            .into_iter()
            .collect(),
        SourceKind::GatewayBatch => gateway::classify_line(raw, GatewayMode::Batch)
            .into_iter()
            .collect(),
        SourceKind::Transcript {
            agent_id,
            session_id,
        } => transcript::classify_record(raw, agent_id, session_id),
    }
}

/// Lines of a reader, decoded lossily. Invalid UTF-8 spoils only its own
/// line; a read error ends the sequence.
pub fn lossy_lines<R: BufRead>(mut reader: R) -> impl Iterator<Item = String> {
    let mut buf = Vec::new();
    std::iter::from_fn(move || {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                Some(String::from_utf8_lossy(line).into_owned())
            }
        }
    })
}
