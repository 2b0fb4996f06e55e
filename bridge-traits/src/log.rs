//! Host Logging Abstractions
//!
//! Records mirrored from `tracing` into the host's own log pipeline. On a
//! device that is dlog, which keys every line by a tag and a one-letter
//! priority; off device the [`StderrLogger`] prints the same shape.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default dlog tag for records produced by the player core.
pub const DEFAULT_LOG_TAG: &str = "VideoPlayerCore";

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `log_priority` value understood by `dlog_print`.
    pub fn dlog_priority(&self) -> i32 {
        match self {
            LogLevel::Trace => 2,
            LogLevel::Debug => 3,
            LogLevel::Info => 4,
            LogLevel::Warn => 5,
            LogLevel::Error => 6,
        }
    }

    /// Letter used by dlogutil in front of the tag.
    pub fn as_char(&self) -> char {
        match self {
            LogLevel::Trace => 'V',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
        }
    }
}

/// One mirrored log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub tag: String,
    /// Emitting module path (`core_drm::session`)
    pub target: String,
    pub message: String,
    /// Player the record belongs to, taken from the event or its spans
    pub player_id: Option<i64>,
    pub fields: BTreeMap<String, String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            tag: DEFAULT_LOG_TAG.to_string(),
            target: target.into(),
            message: message.into(),
            player_id: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_player(mut self, player_id: i64) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Message body as handed to dlog: `[target] #id message key=value ...`.
    pub fn body(&self) -> String {
        let mut line = format!("[{}] ", self.target);
        if let Some(id) = self.player_id {
            let _ = write!(line, "#{id} ");
        }
        line.push_str(&self.message);
        for (key, value) in &self.fields {
            let _ = write!(line, " {key}={value}");
        }
        line
    }
}

/// Receiver of mirrored log records.
///
/// Records are produced on whatever thread logged, including native
/// callback threads; `log` must be quick and must not call into a player.
///
/// ```ignore
/// struct Dlog;
///
/// impl LoggerSink for Dlog {
///     fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
///         // dlog_print(entry.level.dlog_priority(), tag, "%s", body)
///         Ok(())
///     }
/// }
/// ```
pub trait LoggerSink: Send + Sync {
    fn log(&self, entry: LogEntry) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Records below this level are not delivered.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Prints records to stderr in dlogutil's layout.
#[derive(Debug, Clone)]
pub struct StderrLogger {
    pub min_level: LogLevel,
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl StderrLogger {
    pub fn format(entry: &LogEntry) -> String {
        format!(
            "{} {}/{}: {}",
            entry.timestamp.format("%m-%d %H:%M:%S%.3f"),
            entry.level.as_char(),
            entry.tag,
            entry.body()
        )
    }
}

impl LoggerSink for StderrLogger {
    fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", Self::format(&entry));
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
