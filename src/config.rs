use std::path::PathBuf;
use std::time::Duration;

use crate::store::DEFAULT_CAPACITY;

pub const DEFAULT_LOG_DIR: &str = "/tmp/openclaw";
/// HTTP port for `--serve` given without a value.
pub const DEFAULT_PORT: u16 = 8742;

/// Scheduling of the live pipeline loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How often a missing log file is looked for again. While watching, the
    /// same tick also re-reads the file in case a notification was missed.
    pub retry: Duration,
    /// How often the current date is compared with the watched file.
    pub rotation_check: Duration,
    /// Pause between releasing the old file and looking for the new one.
    pub rotation_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            retry: Duration::from_secs(5),
            rotation_check: Duration::from_secs(60),
            rotation_delay: Duration::from_secs(1),
        }
    }
}

/// Resolved runtime settings. Command-line flags override the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `openclaw-YYYY-MM-DD.log`.
    pub log_dir: PathBuf,
    /// Gateway data directory; transcripts live under `agents/` inside it.
    pub openclaw_dir: PathBuf,
    /// Persisted live events.
    pub activity_file: PathBuf,
    pub capacity: usize,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        let openclaw_dir = openclaw_dir();
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            activity_file: openclaw_dir.join("activity.jsonl"),
            openclaw_dir,
            capacity: DEFAULT_CAPACITY,
            timing: Timing::default(),
        }
    }
}

/// `$HOME/.openclaw`, or `.openclaw` in the working directory without a home.
pub fn openclaw_dir() -> PathBuf {
    match dirs_home() {
        Some(home) => home.join(".openclaw"),
        None => PathBuf::from(".openclaw"),
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
