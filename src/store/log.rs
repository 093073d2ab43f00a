use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};

use crate::activity::ActivityEvent;

/// Append-only newline-delimited JSON file of activity events.
///
/// Readers must tolerate malformed or half-written trailing lines; they are
/// skipped on load.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line, creating the file and its parent
    /// directory on first use.
    pub fn append(&self, event: &ActivityEvent) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let mut line = serde_json::to_string(event).wrap_err("Failed to encode event")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .wrap_err_with(|| format!("Failed to append to {}", self.path.display()))?;
        Ok(())
    }

    /// Load the last `limit` persisted lines, skipping any that do not parse.
    /// A missing or unreadable file loads as empty.
    pub fn load(&self, limit: usize) -> Vec<ActivityEvent> {
        let content = match fs::read(&self.path) {
            Ok(c) => c,
            Err(err) => {
                if self.path.exists() {
                    tracing::error!(path = %self.path.display(), %err, "failed to load existing events");
                }
                return Vec::new();
            }
        };

        // Bytes, not text: one record with bad UTF-8 must not sink the rest.
        let lines: Vec<&[u8]> = content
            .split(|b| *b == b'\n')
            .filter(|l| !l.iter().all(u8::is_ascii_whitespace))
            .collect();
        let start = lines.len().saturating_sub(limit);
        let mut skipped = 0usize;
        let events: Vec<ActivityEvent> = lines[start..]
            .iter()
            .filter_map(|line| match serde_json::from_slice(line) {
                Ok(event) => Some(event),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            tracing::debug!(skipped, path = %self.path.display(), "skipped malformed persisted events");
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{EventStatus, EventType};

    fn event(ts: i64) -> ActivityEvent {
        ActivityEvent::new(ts, EventType::Session, "state", EventStatus::Info)
    }

    #[test]
    fn test_append_creates_parent_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(tmp.path().join("nested").join("activity.jsonl"));
        log.append(&event(1)).unwrap();
        log.append(&event(2)).unwrap();

        let loaded = log.load(100);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].ts, 1);
        assert_eq!(loaded[1].ts, 2);
    }

    #[test]
    fn test_load_skips_corrupt_and_partial_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("activity.jsonl");
        let good = serde_json::to_string(&event(7)).unwrap();
        fs::write(
            &path,
            format!("{good}\nnot json\n\n{{\"ts\":1,\"id\":\"x\"}}\n{good}\n{{\"ts\":9,\"id\""),
        )
        .unwrap();

        let loaded = ActivityLog::new(&path).load(100);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|e| e.ts == 7));
    }

    #[test]
    fn test_load_survives_invalid_utf8_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("activity.jsonl");
        let good = serde_json::to_string(&event(7)).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(good.as_bytes());
        bytes.extend_from_slice(b"\n{\"corrupt\":\"\xff\xfe\"}\r\n");
        bytes.extend_from_slice(good.as_bytes());
        bytes.push(b'\n');
        fs::write(&path, bytes).unwrap();

        let loaded = ActivityLog::new(&path).load(100);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|e| e.ts == 7));
    }

    #[test]
    fn test_load_keeps_only_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(tmp.path().join("a.jsonl"));
        for ts in 0..10 {
            log.append(&event(ts)).unwrap();
        }
        let loaded = log.load(3);
        let ts: Vec<_> = loaded.iter().map(|e| e.ts).collect();
        assert_eq!(ts, [7, 8, 9]);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ActivityLog::new(tmp.path().join("none.jsonl")).load(10).is_empty());
    }

    #[test]
    fn test_append_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of the file makes the open fail.
        let path = tmp.path().join("activity.jsonl");
        fs::create_dir(&path).unwrap();
        assert!(ActivityLog::new(&path).append(&event(1)).is_err());
    }
}
