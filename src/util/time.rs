//! Timestamp formatting helpers for clientlog.
//!
//! Event timestamps are rendered once, at capture time, in the format the
//! collector expects.

use chrono::{DateTime, Utc};

/// Wire representation of an event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// RFC 1123 style UTC string, e.g. `Tue, 15 Jan 2024 10:23:45 GMT`.
    #[default]
    Utc,
    /// Milliseconds since the Unix epoch.
    Epoch,
}

impl TimestampFormat {
    /// Parse the `timestampFormat` option value (case-insensitive).
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "utc" => Some(Self::Utc),
            "epoch" => Some(Self::Epoch),
            _ => None,
        }
    }

    /// Render `ts` in this format.
    pub fn render(self, ts: &DateTime<Utc>) -> String {
        match self {
            Self::Utc => format_utc_string(ts),
            Self::Epoch => ts.timestamp_millis().to_string(),
        }
    }
}

/// Format a UTC timestamp the way browsers render `Date.toUTCString()`.
pub fn format_utc_string(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format a `std::time::Duration` as whole milliseconds for log output.
pub fn format_millis(d: std::time::Duration) -> String {
    format!("{}ms", d.as_millis())
}
