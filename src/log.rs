//! Logging sinks handed to the orchestrator at construction.
//!
//! The core only ever talks to a `SyncLogger`. Which sink is used is a
//! presentation decision made from `Config`.

use colored::Colorize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait SyncLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Null sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpLogger;

impl SyncLogger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Writes colored lines to stderr, dropping anything below `min_level`.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl SyncLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        eprintln!("{}", format_line(level, message));
    }
}

fn format_line(level: LogLevel, message: &str) -> String {
    match level {
        LogLevel::Debug => format!("  {} {}", "debug:".dimmed(), message.dimmed()),
        LogLevel::Info => format!("  {} {}", "info:".green(), message),
        LogLevel::Warn => format!("  {} {}", "warning:".yellow(), message),
        LogLevel::Error => format!("  {} {}", "error:".red().bold(), message),
    }
}

/// Keeps every message in memory so tests can assert on what was logged.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl SyncLogger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_logger_keeps_order_and_levels() {
        let logger = RecordingLogger::new();
        logger.info("fetched");
        logger.warn("no upstream");
        logger.error("pull failed");

        let entries = logger.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (LogLevel::Info, "fetched".to_string()));
        assert_eq!(logger.messages_at(LogLevel::Warn), vec!["no upstream"]);
        assert_eq!(logger.messages_at(LogLevel::Debug), Vec::<String>::new());
    }

    #[test]
    fn test_level_ordering_filters_debug_by_default() {
        assert!(LogLevel::Debug < ConsoleLogger::default().min_level);
        assert!(LogLevel::Error > LogLevel::Warn);
    }
}
