//! Configuration for the client logger.
//!
//! [`ClientLogOptions`] is the raw option bag as it arrives from the embedding
//! page (camelCase JSON, every field optional). [`Settings`] is the validated,
//! immutable value built from it exactly once; components receive it behind
//! an `Rc` and never mutate it.

use std::rc::Rc;

use serde::Deserialize;

use crate::core::event_record::EventRecord;
use crate::core::level::LogLevel;
use crate::core::strategy::CollectionType;
use crate::util::constants::*;
use crate::util::error::{ClientLogError, Result};
use crate::util::time::TimestampFormat;

/// Predicate deciding whether an event may leave the page.
pub type EventFilter = Rc<dyn Fn(&EventRecord) -> bool>;

/// Raw options as supplied by the page.
///
/// Unknown keys are ignored; missing keys take the documented defaults when
/// converted into [`Settings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientLogOptions {
    pub url: Option<String>,
    pub method: Option<String>,
    /// Level name (`"warn"`) or number (`2`).
    pub log_level: Option<serde_json::Value>,
    pub collection_type: Option<String>,
    pub collection_timer: Option<u64>,
    pub max_queue_size: Option<usize>,
    pub max_entries_per_page: Option<usize>,
    pub wrap_window_on_error: Option<bool>,
    pub replace_window_on_error: Option<bool>,
    pub wrap_wicket_log: Option<bool>,
    pub replace_wicket_log: Option<bool>,
    pub log_additional_errors: Option<bool>,
    pub log_stacktrace: Option<bool>,
    pub collect_client_infos: Option<bool>,
    pub flush_messages_on_unload: Option<bool>,
    pub debug: Option<bool>,
    pub timestamp_format: Option<String>,
    pub storage_key: Option<String>,
    pub load_flush_delay: Option<u64>,
}

impl ClientLogOptions {
    /// Parse options from a JSON object.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Options with only the transport target set.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// How a pre-existing hook is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// Leave the hook alone.
    Disabled,
    /// Install the bridge and keep calling the original.
    Wrap,
    /// Install the bridge without calling the original.
    Replace,
}

impl HookMode {
    /// Wrapping wins when both flags are set.
    pub fn from_flags(wrap: bool, replace: bool) -> Self {
        if wrap {
            HookMode::Wrap
        } else if replace {
            HookMode::Replace
        } else {
            HookMode::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        self != HookMode::Disabled
    }

    pub fn chains_original(self) -> bool {
        self == HookMode::Wrap
    }
}

/// Validated, read-only configuration.
#[derive(Clone)]
pub struct Settings {
    pub url: String,
    pub method: String,
    pub log_level: LogLevel,
    pub collection_type: CollectionType,
    pub collection_timer: std::time::Duration,
    pub max_queue_size: usize,
    pub max_entries_per_page: Option<usize>,
    pub window_on_error: HookMode,
    pub wicket_log: HookMode,
    pub log_additional_errors: bool,
    pub log_stacktrace: bool,
    pub collect_client_infos: bool,
    /// Always `false` for the `unload` and `localstorage` strategies.
    pub flush_messages_on_unload: bool,
    pub debug: bool,
    pub timestamp_format: TimestampFormat,
    pub storage_key: String,
    pub load_flush_delay: std::time::Duration,
    custom_filter: Option<EventFilter>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("log_level", &self.log_level)
            .field("collection_type", &self.collection_type)
            .field("collection_timer", &self.collection_timer)
            .field("max_queue_size", &self.max_queue_size)
            .field("max_entries_per_page", &self.max_entries_per_page)
            .field("window_on_error", &self.window_on_error)
            .field("wicket_log", &self.wicket_log)
            .field("log_additional_errors", &self.log_additional_errors)
            .field("log_stacktrace", &self.log_stacktrace)
            .field("collect_client_infos", &self.collect_client_infos)
            .field("flush_messages_on_unload", &self.flush_messages_on_unload)
            .field("debug", &self.debug)
            .field("timestamp_format", &self.timestamp_format)
            .field("storage_key", &self.storage_key)
            .field("load_flush_delay", &self.load_flush_delay)
            .field("custom_filter", &self.custom_filter.is_some())
            .finish()
    }
}

impl Settings {
    /// Validate `options` and apply defaults.
    ///
    /// # Errors
    /// - [`ClientLogError::MissingUrl`] if `url` is absent or blank.
    /// - [`ClientLogError::UnknownCollectionType`] for an unsupported strategy.
    /// - [`ClientLogError::UnknownTimestampFormat`] for an unsupported format.
    pub fn from_options(options: ClientLogOptions) -> Result<Self> {
        let url = match options.url {
            Some(url) if !url.trim().is_empty() => url,
            other => return Err(ClientLogError::MissingUrl(other)),
        };

        let collection_type = match options.collection_type.as_deref() {
            Some(name) => CollectionType::parse(name)?,
            None => CollectionType::default(),
        };

        let timestamp_format = match options.timestamp_format.as_deref() {
            Some(name) => TimestampFormat::parse(name)
                .ok_or_else(|| ClientLogError::UnknownTimestampFormat(name.to_owned()))?,
            None => TimestampFormat::default(),
        };

        let log_level = options
            .log_level
            .as_ref()
            .map_or(LogLevel::Error, LogLevel::from_value);

        // unload and localstorage define their own end-of-page behaviour
        let flush_messages_on_unload = match collection_type {
            CollectionType::Unload | CollectionType::LocalStorage => false,
            _ => options.flush_messages_on_unload.unwrap_or(true),
        };

        Ok(Self {
            url,
            method: options
                .method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_METHOD.to_owned()),
            log_level,
            collection_type,
            collection_timer: std::time::Duration::from_millis(
                options
                    .collection_timer
                    .unwrap_or(DEFAULT_COLLECTION_TIMER_MS),
            ),
            max_queue_size: options
                .max_queue_size
                .unwrap_or(DEFAULT_MAX_QUEUE_SIZE)
                .max(1),
            max_entries_per_page: options.max_entries_per_page,
            window_on_error: HookMode::from_flags(
                options.wrap_window_on_error.unwrap_or(true),
                options.replace_window_on_error.unwrap_or(false),
            ),
            wicket_log: HookMode::from_flags(
                options.wrap_wicket_log.unwrap_or(true),
                options.replace_wicket_log.unwrap_or(false),
            ),
            log_additional_errors: options.log_additional_errors.unwrap_or(true),
            log_stacktrace: options.log_stacktrace.unwrap_or(false),
            collect_client_infos: options.collect_client_infos.unwrap_or(true),
            flush_messages_on_unload,
            debug: options.debug.unwrap_or(false),
            timestamp_format,
            storage_key: options
                .storage_key
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_owned()),
            load_flush_delay: std::time::Duration::from_millis(
                options
                    .load_flush_delay
                    .unwrap_or(DEFAULT_LOAD_FLUSH_DELAY_MS),
            ),
            custom_filter: None,
        })
    }

    /// Parse and validate a JSON option object in one step.
    pub fn from_json(input: &str) -> Result<Self> {
        Self::from_options(ClientLogOptions::from_json(input)?)
    }

    /// Install a predicate that every outgoing event must satisfy.
    pub fn with_custom_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&EventRecord) -> bool + 'static,
    {
        self.custom_filter = Some(Rc::new(filter));
        self
    }

    pub fn custom_filter(&self) -> Option<&EventFilter> {
        self.custom_filter.as_ref()
    }
}
