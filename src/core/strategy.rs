//! Collection strategies: when a submitted event leaves the page.
//!
//! The strategy is chosen once from [`CollectionType`] through
//! [`build_strategy`] and fixed for the page's lifetime.
//!
//! | type         | submit                         | flush trigger                    |
//! |--------------|--------------------------------|----------------------------------|
//! | single       | flush now                      | none                             |
//! | timer        | queue                          | recurring interval               |
//! | size         | queue, flush at `maxQueueSize` | queue length                     |
//! | unload       | queue                          | page unload                      |
//! | localstorage | persist                        | shortly after the next page load |

use std::rc::Rc;
use std::time::Duration;

use crate::core::config::Settings;
use crate::core::event_record::EventRecord;
use crate::core::store::{KeyValueStore, PersistentQueueStore};
use crate::util::error::{ClientLogError, Result};

/// Supported collection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionType {
    #[default]
    Single,
    Timer,
    Size,
    Unload,
    LocalStorage,
}

impl CollectionType {
    pub const ALL: [CollectionType; 5] = [
        CollectionType::Single,
        CollectionType::Timer,
        CollectionType::Size,
        CollectionType::Unload,
        CollectionType::LocalStorage,
    ];

    /// Parse the `collectionType` option (case-insensitive).
    ///
    /// # Errors
    /// Returns [`ClientLogError::UnknownCollectionType`] for anything else.
    pub fn parse(input: &str) -> Result<Self> {
        let lowered = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| ClientLogError::UnknownCollectionType(input.to_owned()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionType::Single => "single",
            CollectionType::Timer => "timer",
            CollectionType::Size => "size",
            CollectionType::Unload => "unload",
            CollectionType::LocalStorage => "localstorage",
        }
    }
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dispatcher should do after a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Buffered; a later trigger flushes it.
    Buffered,
    /// Flush now.
    Flush,
    /// The event could not be buffered and is lost.
    Dropped,
}

/// Host signals a strategy wants wired to a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushTriggers {
    /// Flush on a recurring timer.
    pub interval: Option<Duration>,
    /// Flush synchronously when the page unloads.
    pub on_unload: bool,
    /// Flush this long after the page's load-complete signal.
    pub after_load: Option<Duration>,
}

/// A flush policy.
pub trait CollectionStrategy {
    fn kind(&self) -> CollectionType;

    /// Buffer `record`, using `queue` or the strategy's own storage.
    fn on_submit(&mut self, record: EventRecord, queue: &mut Vec<EventRecord>) -> SubmitOutcome;

    /// Snapshot and clear the buffered events, oldest first.
    fn take_batch(&mut self, queue: &mut Vec<EventRecord>) -> Vec<EventRecord> {
        std::mem::take(queue)
    }

    /// Number of events waiting to be flushed.
    fn pending(&self, queue: &[EventRecord]) -> usize {
        queue.len()
    }

    fn flush_triggers(&self) -> FlushTriggers {
        FlushTriggers::default()
    }
}

/// Every submit is its own flush.
#[derive(Debug, Default)]
pub struct SingleStrategy;

impl CollectionStrategy for SingleStrategy {
    fn kind(&self) -> CollectionType {
        CollectionType::Single
    }

    fn on_submit(&mut self, record: EventRecord, queue: &mut Vec<EventRecord>) -> SubmitOutcome {
        queue.push(record);
        SubmitOutcome::Flush
    }
}

/// Queue and flush on a recurring interval.
#[derive(Debug)]
pub struct TimerStrategy {
    every: Duration,
}

impl TimerStrategy {
    pub fn new(every: Duration) -> Self {
        Self { every }
    }
}

impl CollectionStrategy for TimerStrategy {
    fn kind(&self) -> CollectionType {
        CollectionType::Timer
    }

    fn on_submit(&mut self, record: EventRecord, queue: &mut Vec<EventRecord>) -> SubmitOutcome {
        queue.push(record);
        SubmitOutcome::Buffered
    }

    fn flush_triggers(&self) -> FlushTriggers {
        FlushTriggers {
            interval: Some(self.every),
            ..FlushTriggers::default()
        }
    }
}

/// Queue until `max` events are waiting.
#[derive(Debug)]
pub struct SizeStrategy {
    max: usize,
}

impl SizeStrategy {
    pub fn new(max: usize) -> Self {
        Self { max: max.max(1) }
    }
}

impl CollectionStrategy for SizeStrategy {
    fn kind(&self) -> CollectionType {
        CollectionType::Size
    }

    fn on_submit(&mut self, record: EventRecord, queue: &mut Vec<EventRecord>) -> SubmitOutcome {
        queue.push(record);
        if queue.len() >= self.max {
            SubmitOutcome::Flush
        } else {
            SubmitOutcome::Buffered
        }
    }
}

/// Queue until the page unloads.
#[derive(Debug, Default)]
pub struct UnloadStrategy;

impl CollectionStrategy for UnloadStrategy {
    fn kind(&self) -> CollectionType {
        CollectionType::Unload
    }

    fn on_submit(&mut self, record: EventRecord, queue: &mut Vec<EventRecord>) -> SubmitOutcome {
        queue.push(record);
        SubmitOutcome::Buffered
    }

    fn flush_triggers(&self) -> FlushTriggers {
        FlushTriggers {
            on_unload: true,
            ..FlushTriggers::default()
        }
    }
}

/// Persist events and send them from the next page load.
///
/// The in-memory queue is never used. Store failures are logged and the
/// affected events dropped. An entry that no longer parses is discarded so
/// later events can be persisted again.
pub struct PersistedStrategy {
    store: PersistentQueueStore,
    delay: Duration,
}

impl PersistedStrategy {
    pub fn new(store: PersistentQueueStore, delay: Duration) -> Self {
        Self { store, delay }
    }

    /// Clear the key after a parse failure. Returns `true` if it was cleared.
    fn discard_corrupt(&self, err: &ClientLogError) -> bool {
        if !matches!(err, ClientLogError::Json(_)) {
            return false;
        }
        tracing::warn!(
            "Discarding unreadable events under '{}': {}",
            self.store.key(),
            err
        );
        match self.store.save(&[]) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to clear '{}': {}", self.store.key(), e);
                false
            }
        }
    }
}

impl CollectionStrategy for PersistedStrategy {
    fn kind(&self) -> CollectionType {
        CollectionType::LocalStorage
    }

    fn on_submit(&mut self, record: EventRecord, _queue: &mut Vec<EventRecord>) -> SubmitOutcome {
        let pushed = match self.store.push(record.clone()) {
            Err(e) if self.discard_corrupt(&e) => self.store.push(record),
            other => other,
        };
        match pushed {
            Ok(len) => {
                tracing::trace!("Persisted event under '{}' ({} pending)", self.store.key(), len);
                SubmitOutcome::Buffered
            }
            Err(e) => {
                tracing::warn!("Failed to persist event under '{}': {}", self.store.key(), e);
                SubmitOutcome::Dropped
            }
        }
    }

    fn take_batch(&mut self, _queue: &mut Vec<EventRecord>) -> Vec<EventRecord> {
        self.store.take().unwrap_or_else(|e| {
            if !self.discard_corrupt(&e) {
                tracing::warn!("Failed to read persisted events from '{}': {}", self.store.key(), e);
            }
            Vec::new()
        })
    }

    fn pending(&self, _queue: &[EventRecord]) -> usize {
        self.store.len().unwrap_or(0)
    }

    fn flush_triggers(&self) -> FlushTriggers {
        FlushTriggers {
            after_load: Some(self.delay),
            ..FlushTriggers::default()
        }
    }
}

/// Build the strategy selected by `settings`.
///
/// # Errors
/// Returns [`ClientLogError::StoreUnavailable`] if `localstorage` is selected
/// without a usable store.
pub fn build_strategy(
    settings: &Settings,
    store: Option<Rc<dyn KeyValueStore>>,
) -> Result<Box<dyn CollectionStrategy>> {
    Ok(match settings.collection_type {
        CollectionType::Single => Box::new(SingleStrategy),
        CollectionType::Timer => Box::new(TimerStrategy::new(settings.collection_timer)),
        CollectionType::Size => Box::new(SizeStrategy::new(settings.max_queue_size)),
        CollectionType::Unload => Box::new(UnloadStrategy),
        CollectionType::LocalStorage => {
            let store = store
                .filter(|s| s.is_available())
                .ok_or(ClientLogError::StoreUnavailable)?;
            Box::new(PersistedStrategy::new(
                PersistentQueueStore::new(store, settings.storage_key.clone()),
                settings.load_flush_delay,
            ))
        }
    })
}
