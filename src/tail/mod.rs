//! Incremental tailing of the dated gateway log.
//!
//! [`TailCursor`] reads only the bytes appended since the last read and
//! carries an unterminated trailing line over to the next one. [`Tailer`]
//! wraps it in the awaiting / watching / rotating state machine; it does no
//! scheduling of its own, the pipeline loop in [`watch`] drives it.

pub mod watch;

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

/// Path of the gateway log for a given day: `<dir>/openclaw-YYYY-MM-DD.log`.
pub fn log_path_for(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("openclaw-{}.log", date.format("%Y-%m-%d")))
}

/// Source of the current date used to pick the log file.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// UTC calendar date from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Read position within one watched file.
#[derive(Debug, Clone)]
pub struct TailCursor {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
}

impl TailCursor {
    /// Start tailing `path` from `offset` (normally the current file size,
    /// so existing content is not replayed).
    pub fn new(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            offset,
            partial: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of the trailing line that has not been terminated yet.
    pub fn partial(&self) -> &[u8] {
        &self.partial
    }

    /// Append freshly read bytes and return the lines they complete.
    ///
    /// Lines are split on `\n` with a trailing `\r` removed; empty lines are
    /// dropped. Whatever follows the last terminator is kept for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(bytes);
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        complete
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Read whatever was appended since the last call and return the completed
    /// lines. A file that did not grow yields nothing; one that shrank only
    /// moves the recorded size down so later growth is read from there.
    pub fn poll(&mut self) -> io::Result<Vec<String>> {
        let len = fs::metadata(&self.path)?.len();
        if len <= self.offset {
            self.offset = len;
            return Ok(Vec::new());
        }

        let mut file = fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.take(len - self.offset).read_to_end(&mut buf)?;
        self.offset += buf.len() as u64;

        Ok(self.feed(&buf))
    }
}

/// Where the tailer is in its lifecycle.
#[derive(Debug, Clone)]
pub enum TailState {
    /// The expected log file does not exist yet.
    AwaitingFile { path: PathBuf },
    Watching { cursor: TailCursor },
    /// The date moved on; the old file is released and `next` is awaited
    /// once the rotation delay has passed.
    Rotating { next: PathBuf },
}

/// State machine for following the current day's gateway log.
#[derive(Debug)]
pub struct Tailer<C: Clock = SystemClock> {
    log_dir: PathBuf,
    clock: C,
    state: TailState,
}

impl Tailer<SystemClock> {
    pub fn new(log_dir: PathBuf) -> Self {
        Self::with_clock(log_dir, SystemClock)
    }
}

impl<C: Clock> Tailer<C> {
    pub fn with_clock(log_dir: PathBuf, clock: C) -> Self {
        let path = log_path_for(&log_dir, clock.today());
        Self {
            log_dir,
            clock,
            state: TailState::AwaitingFile { path },
        }
    }

    /// The log path for the clock's current date.
    pub fn expected_path(&self) -> PathBuf {
        log_path_for(&self.log_dir, self.clock.today())
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, TailState::AwaitingFile { .. })
    }

    /// The file currently being read, if any.
    pub fn watched_path(&self) -> Option<&Path> {
        match &self.state {
            TailState::Watching { cursor } => Some(cursor.path()),
            _ => None,
        }
    }

    /// Retry step while awaiting: recompute the expected path and start
    /// watching it if it exists. Returns the path once watching begins.
    pub fn try_open(&mut self) -> Option<PathBuf> {
        if !self.is_awaiting() {
            return None;
        }
        let path = self.expected_path();
        match fs::metadata(&path) {
            Ok(meta) => {
                tracing::info!(path = %path.display(), "watching gateway log");
                let cursor = TailCursor::new(path.clone(), meta.len());
                self.state = TailState::Watching { cursor };
                Some(path)
            }
            Err(_) => {
                tracing::info!(path = %path.display(), "log file not found, waiting");
                self.state = TailState::AwaitingFile { path };
                None
            }
        }
    }

    /// Change notification: read newly appended complete lines. Outside the
    /// watching state this is a no-op.
    pub fn on_change(&mut self) -> Vec<String> {
        let TailState::Watching { cursor } = &mut self.state else {
            return Vec::new();
        };
        match cursor.poll() {
            Ok(lines) => lines,
            Err(err) => {
                tracing::debug!(path = %cursor.path().display(), %err, "read of watched log failed");
                Vec::new()
            }
        }
    }

    /// Periodic rotation check. If the date now points at a different file,
    /// the current cursor (and its unterminated tail) is dropped and the new
    /// path is returned; the caller resumes with [`Tailer::finish_rotation`].
    pub fn check_rotation(&mut self) -> Option<PathBuf> {
        let watched = self.watched_path()?;
        let next = self.expected_path();
        if next == watched {
            return None;
        }
        if let TailState::Watching { cursor } = &self.state {
            if !cursor.partial().is_empty() {
                tracing::debug!(bytes = cursor.partial().len(), "discarding unterminated line from rotated log");
            }
        }
        tracing::info!(path = %next.display(), "log rotated, switching");
        self.state = TailState::Rotating { next: next.clone() };
        Some(next)
    }

    /// End of the rotation delay: start awaiting the new file.
    pub fn finish_rotation(&mut self) {
        if let TailState::Rotating { next } = &self.state {
            self.state = TailState::AwaitingFile { path: next.clone() };
        }
    }
}
