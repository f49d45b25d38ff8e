// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Log sinks injected into every pipeline component.
//!
//! Components never pick their own destination: callers hand them a
//! [`LogSink`] and decide where messages go (console, file, memory).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use colored::Colorize;

use crate::error::Result;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Routine progress.
    Info,
    /// Completed successfully.
    Success,
    /// Suspicious but not failed.
    Warn,
    /// Failed.
    Error,
}

impl Level {
    /// Upper-case label used by text sinks.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Destination for pipeline log records.
pub trait LogSink {
    /// Record a message at the given level.
    fn log(&self, level: Level, message: &str);

    /// Routine progress.
    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    /// Completed successfully.
    fn success(&self, message: &str) {
        self.log(Level::Success, message);
    }

    /// Suspicious but not failed.
    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    /// Failed.
    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn log(&self, level: Level, message: &str) {
        (**self).log(level, message);
    }
}

/// Coloured console output.
///
/// Info and success lines go to stdout and are suppressed when not verbose;
/// warnings and errors always go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    /// Create a console sink.
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether info lines are printed.
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Info => {
                if self.verbose {
                    println!("{message}");
                }
            }
            Level::Success => {
                if self.verbose {
                    println!("{} {message}", "✅".green());
                }
            }
            Level::Warn => eprintln!("{} {message}", "WARNING ⚠️".yellow().bold()),
            Level::Error => eprintln!("{} {message}", "Error:".red().bold()),
        }
    }
}

/// Timestamp layout of [`FileSink`] lines, e.g. `2024-03-07 14:02:11,482`.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Appends `timestamp - LEVEL - message` lines to a log file.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) a log file for appending, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut file) = self.file.lock() {
            // A failing log write has nowhere else to be reported.
            let _ = writeln!(
                file,
                "{} - {} - {message}",
                Local::now().format(FILE_TIMESTAMP_FORMAT),
                level.as_str()
            );
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    #[must_use]
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Messages recorded at exactly `level`.
    #[must_use]
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    /// Whether any record at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}

/// Sends every record to two sinks.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: LogSink, B: LogSink> Tee<A, B> {
    /// Combine two sinks.
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: LogSink, B: LogSink> LogSink for Tee<A, B> {
    fn log(&self, level: Level, message: &str) {
        self.first.log(level, message);
        self.second.log(level, message);
    }
}
