use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::activity::ActivityEvent;
use crate::ingest::transcript::parse_transcript_file;

/// Number of most recent session transcripts scanned per agent.
pub const SESSIONS_PER_AGENT: usize = 5;

/// Read-only view over the per-agent transcript directories:
/// `<root>/agents/<agent>/sessions/<session-id>.jsonl`.
#[derive(Debug, Clone)]
pub struct TranscriptArchive {
    agents_dir: PathBuf,
}

impl TranscriptArchive {
    /// `root` is the gateway data directory (the parent of `agents/`).
    pub fn new(root: &Path) -> Self {
        Self {
            agents_dir: root.join("agents"),
        }
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    /// Names of all agent directories, sorted.
    pub fn agents(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.agents_dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut agents: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .collect();
        agents.sort();
        agents
    }

    /// Directory of one agent. Names that are not a single plain path
    /// component (`..`, absolute paths, nested paths) have none.
    fn agent_dir(&self, agent: &str) -> Option<PathBuf> {
        let mut components = Path::new(agent).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.agents_dir.join(name)),
            _ => None,
        }
    }

    /// The newest transcripts of an agent by modification time, newest first.
    pub fn recent_sessions(&self, agent: &str) -> Vec<PathBuf> {
        let Some(agent_dir) = self.agent_dir(agent) else {
            tracing::debug!(agent, "rejected agent name");
            return Vec::new();
        };
        let entries = match fs::read_dir(agent_dir.join("sessions")) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<(PathBuf, std::time::SystemTime)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                    return None;
                }
                let mtime = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, mtime))
            })
            .collect();
        files.sort_by(|a, b| b.1.cmp(&a.1));
        files
            .into_iter()
            .take(SESSIONS_PER_AGENT)
            .map(|(path, _)| path)
            .collect()
    }

    /// Scan recent transcripts of one agent (or all) into a newest-first list
    /// of at most `limit` events.
    ///
    /// Reading stops early once twice `limit` events have been collected;
    /// files are visited per agent, newest first, so the final sort restores
    /// a total order across agents.
    pub fn scan(&self, agent: Option<&str>, limit: usize) -> Vec<ActivityEvent> {
        let agents = match agent {
            Some(a) => vec![a.to_string()],
            None => self.agents(),
        };
        let threshold = limit.saturating_mul(2);

        let mut events = Vec::new();
        for agent in &agents {
            for file in self.recent_sessions(agent) {
                events.extend(parse_transcript_file(&file, agent));
                if events.len() >= threshold {
                    break;
                }
            }
        }

        tracing::debug!(agents = agents.len(), events = events.len(), "scanned transcripts");
        events.sort_by(|a, b| b.ts.cmp(&a.ts));
        events.truncate(limit);
        events
    }
}

#[cfg(test)]
#[path = "../../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;
