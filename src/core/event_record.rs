//! Canonical data structure for a single captured client-side event.
//!
//! Records are created by the facade (explicit log calls) or the hook bridge
//! (uncaught errors) and consumed by the dispatcher at flush time. They are
//! serialisable so the persisted strategy can keep them across page loads.

use serde::{Deserialize, Serialize};

use crate::core::level::LogLevel;

/// Represents a single captured log call or uncaught error.
///
/// Immutable once built; the timestamp is rendered at capture time in the
/// configured [`crate::util::time::TimestampFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Severity. Never [`LogLevel::Off`].
    level: LogLevel,

    /// The log message.
    message: String,

    /// Script file the error originated from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_file: Option<String>,

    /// Line within `source_file`, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_line: Option<u32>,

    /// Captured stack trace. `None` when capture was disabled or unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack: Option<String>,

    /// Rendered timestamp.
    timestamp: String,
}

/// Source location of an uncaught error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl EventRecord {
    /// Build a record. `Off` is promoted to `Error`, since `Off` is only
    /// meaningful as a threshold.
    pub fn new(level: LogLevel, message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        let level = if level == LogLevel::Off {
            LogLevel::Error
        } else {
            level
        };
        Self {
            level,
            message: message.into(),
            source_file: None,
            source_line: None,
            stack: None,
            timestamp: timestamp.into(),
        }
    }

    /// Attach a stack trace. Empty traces are stored as `None`.
    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack.filter(|s| !s.is_empty());
        self
    }

    /// Attach the source location of an uncaught error.
    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source_file = source.file;
        self.source_line = source.line;
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn source_line(&self) -> Option<u32> {
        self.source_line
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// One-line rendering used by the console mirror: `[level] message`,
    /// followed by the stack on the next lines when present.
    pub fn console_line(&self) -> String {
        let mut line = format!("[{}] {}", self.level, self.message);
        if let Some(stack) = &self.stack {
            line.push('\n');
            line.push_str(stack);
        }
        line
    }
}
