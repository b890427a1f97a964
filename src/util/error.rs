//! Unified error types for clientlog.
//!
//! All fallible operations throughout the codebase return `Result<T, ClientLogError>`.
//! Configuration errors surface synchronously from `Settings::from_options` and
//! `ClientLogger::initialize`; runtime delivery problems are logged, never returned.

/// Unified error type used throughout clientlog.
///
/// Each variant captures enough context to produce an actionable message for
/// the embedding application or for log output.
#[derive(Debug, thiserror::Error)]
pub enum ClientLogError {
    /// No transport target was configured, or it was empty.
    #[error("there's no valid url set: {0:?}")]
    MissingUrl(Option<String>),

    /// The configured collection type is not one of the supported strategies.
    #[error(
        "invalid collection type: {0}; must be one of: [single, timer, size, unload, localstorage]"
    )]
    UnknownCollectionType(String),

    /// The configured timestamp format is not supported.
    #[error("invalid timestamp format: {0}; must be one of: [utc, epoch]")]
    UnknownTimestampFormat(String),

    /// The persisted strategy was selected but the host offers no usable store.
    #[error("collection type 'localstorage' requires a persistent store")]
    StoreUnavailable,

    /// The persistent store rejected a read or write.
    #[error("Persistent store error: {0}")]
    Store(String),

    /// Stored or configured JSON could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for I/O errors (reading option files, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientLogError {
    /// Returns `true` for errors raised while validating configuration.
    ///
    /// These abort `initialize` before any hook is installed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ClientLogError::MissingUrl(_)
                | ClientLogError::UnknownCollectionType(_)
                | ClientLogError::UnknownTimestampFormat(_)
                | ClientLogError::StoreUnavailable
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientLogError>;

/// Build a [`ClientLogError::Store`] with the given context string.
///
/// # Example
/// ```ignore
/// store_err("quota exceeded while saving 'clientside-logging'")
/// ```
pub fn store_err(context: impl Into<String>) -> ClientLogError {
    ClientLogError::Store(context.into())
}
