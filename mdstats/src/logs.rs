//! Run logging.
//!
//! Every entry is echoed to stderr and broadcast. The CLI subscribes with a
//! [`RunLog`] for the length of a run so it can report how many records or
//! stages went wrong and keep the entries for a JSON log file.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Entries a subscriber can fall behind by before it starts missing some
const CHANNEL_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌ ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Sub-step depth
    #[serde(default)]
    pub depth: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            depth: 0,
        }
    }

    pub fn at_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }
}

/// Process-wide log channel
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn log(&self, entry: LogEntry) {
        eprintln!(
            "{}{}{}",
            "   ".repeat(entry.depth as usize + 1),
            entry.level.marker(),
            entry.message
        );
        // Sending fails only when nobody listens
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, depth: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).at_depth(depth));
}

// =============================================================================
// Run log
// =============================================================================

/// Collects the entries logged while a run is in progress.
pub struct RunLog {
    receiver: broadcast::Receiver<LogEntry>,
    entries: Vec<LogEntry>,
    missed: u64,
}

impl RunLog {
    /// Subscribe to the global broadcaster; earlier entries are not seen
    pub fn start() -> Self {
        Self::subscribe_to(&LOG_BROADCASTER)
    }

    pub fn subscribe_to(broadcaster: &LogBroadcaster) -> Self {
        Self {
            receiver: broadcaster.subscribe(),
            entries: Vec::new(),
            missed: 0,
        }
    }

    /// Pull every entry sent since the last call
    pub fn collect(&mut self) -> &[LogEntry] {
        loop {
            match self.receiver.try_recv() {
                Ok(entry) => self.entries.push(entry),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        &self.entries
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    /// Entries dropped because the channel overflowed
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// One line for the end of a run, `None` when nothing went wrong
    pub fn summary(&self) -> Option<String> {
        let warnings = self.count(LogLevel::Warning);
        let errors = self.count(LogLevel::Error);
        if warnings == 0 && errors == 0 && self.missed == 0 {
            return None;
        }
        let mut line = format!("{} warnings, {} errors", warnings, errors);
        if self.missed > 0 {
            line.push_str(&format!(" ({} entries not captured)", self.missed));
        }
        Some(line)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_collects_entries() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.log(LogEntry::new(LogLevel::Info, "before subscribing"));

        let mut run = RunLog::subscribe_to(&broadcaster);
        broadcaster.log(LogEntry::new(LogLevel::Warning, "stylesheet missing").at_depth(1));
        broadcaster.log(LogEntry::new(LogLevel::Error, "record r1: parse error"));
        broadcaster.log(LogEntry::new(LogLevel::Success, "Parsed 2 records"));

        let entries = run.collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "stylesheet missing");
        assert_eq!(entries[0].depth, 1);
        assert_eq!(run.count(LogLevel::Error), 1);
        assert_eq!(run.summary().as_deref(), Some("1 warnings, 1 errors"));
    }

    #[test]
    fn test_quiet_run_has_no_summary() {
        let broadcaster = LogBroadcaster::new();
        let mut run = RunLog::subscribe_to(&broadcaster);
        broadcaster.log(LogEntry::new(LogLevel::Info, "Processing 3 records"));
        run.collect();
        assert_eq!(run.summary(), None);
    }

    #[test]
    fn test_overflow_is_counted() {
        let broadcaster = LogBroadcaster::new();
        let mut run = RunLog::subscribe_to(&broadcaster);
        for i in 0..CHANNEL_CAPACITY + 5 {
            broadcaster.log(LogEntry::new(LogLevel::Error, format!("record {}", i)));
        }
        run.collect();
        assert_eq!(run.missed(), 5);
        assert_eq!(run.count(LogLevel::Error), CHANNEL_CAPACITY);
        assert!(run.summary().unwrap().ends_with("(5 entries not captured)"));
    }

    #[test]
    fn test_entries_serialize_as_json() {
        let broadcaster = LogBroadcaster::new();
        let mut run = RunLog::subscribe_to(&broadcaster);
        broadcaster.log(LogEntry::new(LogLevel::Success, "done"));
        run.collect();
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["level"], "success");
        assert_eq!(json[0]["depth"], 0);
    }
}
