//! Ordered severity scale shared by the facade, the dispatcher and the wire
//! format.
//!
//! Higher values are more verbose. A configured threshold `T` admits an event
//! of level `L` iff `T > Off && L > Off && T >= L`. `Off` is a threshold only;
//! an event at `Off` is never admitted.

use serde::{Deserialize, Serialize};

/// Log severity, ordered from `Off` (nothing) to `Trace` (everything).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    #[default]
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// All levels in ascending order.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Off,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Lowercase name as sent on the wire (`"error"`, `"warn"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Integer representation (0..=5).
    pub fn as_number(self) -> u8 {
        self as u8
    }

    /// Map an integer back to a level.
    ///
    /// Out-of-range values clamp to [`LogLevel::Trace`]; the same clamp is
    /// applied by [`LogLevel::from_number`].
    pub fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index.min(5))]
    }

    /// Convert a numeric option value into a level.
    ///
    /// Non-finite input resolves to `Error`, fractions are floored, negatives
    /// clamp to `Off` and values above `Trace` clamp to `Trace`.
    pub fn from_number(value: f64) -> Self {
        if !value.is_finite() {
            return LogLevel::Error;
        }
        let floored = value.floor();
        if floored <= 0.0 {
            LogLevel::Off
        } else if floored >= 5.0 {
            LogLevel::Trace
        } else {
            Self::from_index(floored as u8)
        }
    }

    /// Parse a level name (case-insensitive) or a numeric string.
    ///
    /// Never fails: anything unrecognised resolves to `Error`.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => trimmed
                .parse::<f64>()
                .map(Self::from_number)
                .unwrap_or(LogLevel::Error),
        }
    }

    /// Resolve a `logLevel` option given as a JSON string or number.
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => n.as_f64().map_or(LogLevel::Error, Self::from_number),
            _ => LogLevel::Error,
        }
    }

    /// Returns `true` if this threshold lets an event at `level` through.
    pub fn admits(self, level: LogLevel) -> bool {
        self > LogLevel::Off && level > LogLevel::Off && self >= level
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
