//! Collector-side decoding of the flat wire format.
//!
//! Groups `name_i` fields by index, rebuilds each event and collects the
//! known client information keys. Indices are positive and written without
//! leading zeros; any other spelling is ignored. Events without a level or
//! message are skipped; every value passes through a [`LogCleaner`], and a
//! client information value that cleans to nothing is recorded as `NULL`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::level::LogLevel;
use crate::export::payload::{ClientInfos, Payload};
use crate::util::cleaner::LogCleaner;
use crate::util::constants::*;

/// One event recovered from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// The 1-based index the event was sent under.
    pub index: usize,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
    pub stack: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// Everything recovered from one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    /// Sorted by index.
    pub events: Vec<DecodedEvent>,
    pub client_infos: ClientInfos,
}

fn indexed_field() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(timestamp|msg|lvl|stack|file|line)_([1-9]\d*)$").expect("static pattern")
    })
}

impl std::fmt::Display for DecodedEvent {
    /// `[<timestamp> | <level>] <message>`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} | {}] {}", self.timestamp, self.level, self.message)
    }
}

fn client_info_value(cleaned: String) -> String {
    if cleaned.is_empty() {
        DEFAULT_CLIENT_INFO_VALUE.to_owned()
    } else {
        cleaned
    }
}

#[derive(Default)]
struct Partial<'a> {
    fields: BTreeMap<&'a str, &'a str>,
}

/// Decode a payload produced by [`crate::export::payload::encode_batch`].
pub fn decode_payload(payload: &Payload, cleaner: &dyn LogCleaner) -> DecodedBatch {
    let mut partials: BTreeMap<usize, Partial<'_>> = BTreeMap::new();
    let mut client_infos = ClientInfos::default();

    for (key, value) in payload.iter() {
        if let Some(caps) = indexed_field().captures(key) {
            let (Some(name), Some(index)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            match index.as_str().parse::<usize>() {
                Ok(index) => {
                    partials
                        .entry(index)
                        .or_default()
                        .fields
                        .insert(name.as_str(), value);
                }
                Err(e) => tracing::warn!("Skipping field '{}' with bad index: {}", key, e),
            }
        } else if !client_infos.put(key, client_info_value(cleaner.clean(value))) {
            tracing::trace!("Ignoring unknown payload field '{}'", key);
        }
    }

    let events = partials
        .into_iter()
        .filter_map(|(index, partial)| {
            let field = |name: &str| partial.fields.get(name).map(|v| cleaner.clean(v));
            let (Some(level), Some(message)) = (field(PARAM_LEVEL), field(PARAM_MESSAGE)) else {
                tracing::warn!("Skipping event {} because it isn't valid", index);
                return None;
            };
            Some(DecodedEvent {
                index,
                level: LogLevel::parse(&level),
                message,
                timestamp: field(PARAM_TIMESTAMP).unwrap_or_else(|| DEFAULT_TIMESTAMP.to_owned()),
                stack: partial.fields.get(PARAM_STACKTRACE).map(|v| v.to_string()),
                file: field(PARAM_FILE),
                line: field(PARAM_LINE).and_then(|l| l.parse().ok()),
            })
        })
        .collect();

    DecodedBatch {
        events,
        client_infos,
    }
}
