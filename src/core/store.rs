//! Persistence used by the `localstorage` strategy.
//!
//! [`KeyValueStore`] is the host's string store; [`PersistentQueueStore`]
//! keeps a JSON array of [`EventRecord`]s under one key on top of it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::event_record::EventRecord;
use crate::util::error::{store_err, Result};

/// The host's key-value storage (browser local storage or equivalent).
pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`; `None` removes the key.
    fn save(&self, key: &str, value: Option<&str>) -> Result<()>;

    /// Whether the store can be used at all (private browsing, quota, ...).
    fn is_available(&self) -> bool {
        true
    }
}

/// In-memory store. Sharing one instance between two hosts models the same
/// browser profile across page loads.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    available: bool,
    quota: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: RefCell::default(),
            available: true,
            quota: None,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports itself unusable, like storage disabled by the
    /// browser.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// Reject writes whose value exceeds `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Raw value stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn save(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut entries = self.entries.borrow_mut();
        match value {
            Some(value) => {
                if let Some(quota) = self.quota.filter(|&q| value.len() > q) {
                    return Err(store_err(format!(
                        "quota of {quota} bytes exceeded while saving '{key}' ({} bytes)",
                        value.len()
                    )));
                }
                entries.insert(key.to_owned(), value.to_owned());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Event queue persisted under a single key.
#[derive(Clone)]
pub struct PersistentQueueStore {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl PersistentQueueStore {
    pub fn new(store: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// All persisted events, oldest first. A missing or blank entry is empty.
    pub fn load(&self) -> Result<Vec<EventRecord>> {
        match self.store.load(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Replace the persisted events. An empty slice clears the key.
    pub fn save(&self, records: &[EventRecord]) -> Result<()> {
        if records.is_empty() {
            return self.store.save(&self.key, None);
        }
        let raw = serde_json::to_string(records)?;
        self.store.save(&self.key, Some(&raw))
    }

    /// Read-modify-write append. Returns the new queue length.
    pub fn push(&self, record: EventRecord) -> Result<usize> {
        let mut records = self.load()?;
        records.push(record);
        self.save(&records)?;
        Ok(records.len())
    }

    /// Load everything and clear the key.
    pub fn take(&self) -> Result<Vec<EventRecord>> {
        let records = self.load()?;
        if !records.is_empty() {
            self.save(&[])?;
        }
        Ok(records)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::level::LogLevel;
    use crate::util::error::ClientLogError;

    fn queue() -> (Rc<MemoryStore>, PersistentQueueStore) {
        let store = Rc::new(MemoryStore::new());
        let queue = PersistentQueueStore::new(store.clone(), "q");
        (store, queue)
    }

    #[test]
    fn test_push_appends_in_order() {
        let (_, q) = queue();
        assert_eq!(q.push(EventRecord::new(LogLevel::Error, "a", "t")).unwrap(), 1);
        assert_eq!(q.push(EventRecord::new(LogLevel::Warn, "b", "t")).unwrap(), 2);
        let msgs: Vec<_> = q.load().unwrap().iter().map(|r| r.message().to_owned()).collect();
        assert_eq!(msgs, ["a", "b"]);
    }

    #[test]
    fn test_take_clears_key() {
        let (store, q) = queue();
        q.push(EventRecord::new(LogLevel::Error, "a", "t")).unwrap();
        assert_eq!(q.take().unwrap().len(), 1);
        assert!(store.raw("q").is_none());
        assert!(q.is_empty().unwrap());
    }

    #[test]
    fn test_quota_rejects_large_values() {
        let store = Rc::new(MemoryStore::new().with_quota(64));
        let q = PersistentQueueStore::new(store.clone(), "q");
        let err = q
            .push(EventRecord::new(LogLevel::Error, "x".repeat(100), "t"))
            .unwrap_err();
        assert!(matches!(err, ClientLogError::Store(_)), "{err}");
        assert!(err.to_string().contains("quota"), "{err}");
        assert!(store.raw("q").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let (store, q) = queue();
        store.save("q", Some("not json")).unwrap();
        assert!(q.load().is_err());
    }
}
