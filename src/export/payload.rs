//! Outgoing wire format.
//!
//! A batch is encoded as a flat list of key/value pairs so it can travel as
//! a plain form post. Event `i` (1-based, oldest first) contributes
//! `timestamp_i`, `msg_i`, `lvl_i` and, when present, `stack_i`, `file_i`
//! and `line_i`. Client information is attached once per payload.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::ser::SerializeMap;
use serde::Serialize;

use crate::core::event_record::EventRecord;
use crate::util::constants::*;

/// Characters left unescaped in form bodies.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Ordered flat key/value payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<(String, String)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Keys are expected to be unique.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of events, counted by their `msg_i` fields.
    pub fn event_count(&self) -> usize {
        let prefix = format!("{PARAM_MESSAGE}{PARAM_SPLITTER}");
        self.fields
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .count()
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn to_form_body(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, FORM),
                    utf8_percent_encode(v, FORM)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse a form body. `+` is read as a space; pairs without `=` get an
    /// empty value.
    pub fn from_form_body(body: &str) -> Self {
        let decode = |raw: &str| {
            let spaced = raw.replace('+', " ");
            percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
        };
        let fields = body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (decode(k), decode(v)),
                None => (decode(pair), String::new()),
            })
            .collect();
        Self { fields }
    }
}

impl Serialize for Payload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Per-payload client information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfos {
    pub user_agent: Option<String>,
    pub base_url: Option<String>,
    /// `WxH`
    pub window_size: Option<String>,
    /// `WxH`
    pub screen_size: Option<String>,
}

impl ClientInfos {
    /// Render a `(width, height)` pair as `WxH`.
    pub fn size(dimensions: (u32, u32)) -> String {
        format!("{}x{}", dimensions.0, dimensions.1)
    }

    /// Store a value by its wire key. Unknown keys are ignored and return `false`.
    pub fn put(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            PARAM_USER_AGENT => &mut self.user_agent,
            PARAM_BASE_URL => &mut self.base_url,
            PARAM_WINDOW_SIZE => &mut self.window_size,
            PARAM_SCREEN_SIZE => &mut self.screen_size,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    fn write(&self, payload: &mut Payload) {
        let fields = [
            (PARAM_BASE_URL, &self.base_url),
            (PARAM_USER_AGENT, &self.user_agent),
            (PARAM_WINDOW_SIZE, &self.window_size),
            (PARAM_SCREEN_SIZE, &self.screen_size),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                payload.push(key, value.clone());
            }
        }
    }
}

/// Encoding switches that come from the configuration.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Emit `stack_i` for events that carry a stack.
    pub include_stack: bool,
    pub client_infos: ClientInfos,
}

/// Encode `events` (oldest first) into one payload.
pub fn encode_batch(events: &[EventRecord], options: &EncodeOptions) -> Payload {
    let mut payload = Payload::new();
    options.client_infos.write(&mut payload);

    for (i, event) in events.iter().enumerate() {
        let n = i + 1;
        let key = |name: &str| format!("{name}{PARAM_SPLITTER}{n}");

        payload.push(key(PARAM_TIMESTAMP), event.timestamp());
        payload.push(key(PARAM_MESSAGE), event.message());
        payload.push(key(PARAM_LEVEL), event.level().name());

        if options.include_stack {
            if let Some(stack) = event.stack() {
                payload.push(key(PARAM_STACKTRACE), stack);
            }
        }
        if let Some(line) = event.source_line() {
            payload.push(key(PARAM_LINE), line.to_string());
        }
        if let Some(file) = event.source_file() {
            payload.push(key(PARAM_FILE), file);
        }
    }
    payload
}
