//! Value cleaning applied by the collector before a decoded event is logged.

use url::Url;

/// Cleans raw values received from the client.
pub trait LogCleaner {
    /// Return a cleaned copy of `value`.
    fn clean(&self, value: &str) -> String;

    /// Return a cleaned copy of a URL or path, reduced to its local part.
    fn clean_path(&self, value: &str) -> String;
}

/// Removes tabs and line breaks and trims surrounding whitespace, so a
/// client-supplied message cannot forge additional log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLogCleaner;

impl LogCleaner for DefaultLogCleaner {
    fn clean(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
            .collect::<String>()
            .trim()
            .to_owned()
    }

    /// Absolute URLs lose scheme, host and fragment (`http://host/a?b` becomes
    /// `/a?b`). Relative paths are returned cleaned; an empty value becomes `/`.
    fn clean_path(&self, value: &str) -> String {
        let cleaned = self.clean(value);
        if cleaned.is_empty() {
            return "/".to_owned();
        }
        match Url::parse(&cleaned) {
            Ok(url) if !url.cannot_be_a_base() => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_owned(),
            },
            _ => cleaned,
        }
    }
}

/// Returns values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogCleaner;

impl LogCleaner for NoOpLogCleaner {
    fn clean(&self, value: &str) -> String {
        value.to_owned()
    }

    fn clean_path(&self, value: &str) -> String {
        value.to_owned()
    }
}
