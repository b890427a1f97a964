//! Crate-wide constants and configuration defaults for clientlog.
//!
//! The wire field names are shared with the backend collector and must not
//! change without a matching collector release.

/// Default HTTP method used by the transport.
pub const DEFAULT_METHOD: &str = "POST";

/// Default recurring flush interval for the timer strategy (milliseconds).
pub const DEFAULT_COLLECTION_TIMER_MS: u64 = 5_000;

/// Default queue length that triggers a flush for the size strategy.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;

/// Delay between the load-complete signal and the flush of persisted events.
pub const DEFAULT_LOAD_FLUSH_DELAY_MS: u64 = 500;

/// Key under which the persisted strategy keeps its queue.
pub const DEFAULT_STORAGE_KEY: &str = "clientside-logging";

/// Base path sent when the host does not report one.
pub const DEFAULT_BASE_PATH: &str = ".";

/// Placeholder used by the collector for a missing timestamp.
pub const DEFAULT_TIMESTAMP: &str = "NULL_TIMESTAMP";

/// Placeholder used by the collector for a missing client info value.
pub const DEFAULT_CLIENT_INFO_VALUE: &str = "NULL";

/// Separator between a field name and its 1-based event index.
pub const PARAM_SPLITTER: char = '_';

// ── Wire field names ────────────────────────────────────────────────────

/// Per-event timestamp field.
pub const PARAM_TIMESTAMP: &str = "timestamp";
/// Per-event message field.
pub const PARAM_MESSAGE: &str = "msg";
/// Per-event level field.
pub const PARAM_LEVEL: &str = "lvl";
/// Per-event stack trace field.
pub const PARAM_STACKTRACE: &str = "stack";
/// Per-event source file field.
pub const PARAM_FILE: &str = "file";
/// Per-event source line field.
pub const PARAM_LINE: &str = "line";

/// User agent, once per payload.
pub const PARAM_USER_AGENT: &str = "ua";
/// Transport base path, once per payload.
pub const PARAM_BASE_URL: &str = "ajaxBaseUrl";
/// Viewport size (`WxH`), once per payload.
pub const PARAM_WINDOW_SIZE: &str = "winSize";
/// Screen size (`WxH`), once per payload.
pub const PARAM_SCREEN_SIZE: &str = "screenSize";

/// Application display name used by the demo binary.
pub const APP_NAME: &str = "clientlog";

/// Application version string.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
