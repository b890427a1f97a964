//! Collector side: writes decoded batches to the log.
//!
//! Each event is written at its own level through `tracing` (target
//! `clientlog::collector`) as
//! `[<clean base path>] [<timestamp> | <level>] <message> [<clean ua>]; Stack: <stack>`.
//! A [`LoggingBarrier`] decides whether a batch, and then each event in it,
//! may be written at all.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::core::level::LogLevel;
use crate::export::decode::{decode_payload, DecodedBatch, DecodedEvent};
use crate::export::payload::{ClientInfos, Payload};
use crate::util::cleaner::{DefaultLogCleaner, LogCleaner};

/// Admission control for incoming client events.
pub trait LoggingBarrier {
    /// Checked once per batch, before any event is written.
    fn allows_batch(&self, events: &[DecodedEvent]) -> bool;

    /// Checked for every event of an admitted batch.
    fn allows_event(&self, event: &DecodedEvent) -> bool;
}

/// Lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllBarrier;

impl LoggingBarrier for AllowAllBarrier {
    fn allows_batch(&self, _events: &[DecodedEvent]) -> bool {
        true
    }

    fn allows_event(&self, _event: &DecodedEvent) -> bool {
        true
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    remaining: usize,
}

/// Allows at most `max_events` events per time window.
///
/// The budget is refilled lazily when a check arrives after the window has
/// elapsed. A batch is admitted only if it fits into the remaining budget.
#[derive(Debug)]
pub struct SizeAndTimeBarrier {
    max_events: usize,
    window: Duration,
    state: Mutex<Window>,
}

impl SizeAndTimeBarrier {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                remaining: max_events,
            }),
        }
    }

    /// [`LoggingBarrier::allows_batch`] against an explicit clock.
    pub fn allows_batch_at(&self, len: usize, now: Instant) -> bool {
        self.with_window(now, |w| w.remaining >= len)
    }

    /// [`LoggingBarrier::allows_event`] against an explicit clock. Consumes
    /// one unit of budget when it returns `true`.
    pub fn allows_event_at(&self, now: Instant) -> bool {
        self.with_window(now, |w| {
            if w.remaining == 0 {
                return false;
            }
            w.remaining -= 1;
            true
        })
    }

    fn with_window<R>(&self, now: Instant, f: impl FnOnce(&mut Window) -> R) -> R {
        let mut window = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if now.saturating_duration_since(window.started) >= self.window {
            window.started = now;
            window.remaining = self.max_events;
        }
        f(&mut window)
    }
}

impl LoggingBarrier for SizeAndTimeBarrier {
    fn allows_batch(&self, events: &[DecodedEvent]) -> bool {
        self.allows_batch_at(events.len(), Instant::now())
    }

    fn allows_event(&self, _event: &DecodedEvent) -> bool {
        self.allows_event_at(Instant::now())
    }
}

/// Writes decoded client batches to the log.
pub struct Collector {
    cleaner: Box<dyn LogCleaner + Send + Sync>,
    barrier: Box<dyn LoggingBarrier + Send + Sync>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(DefaultLogCleaner, AllowAllBarrier)
    }
}

impl Collector {
    pub fn new(
        cleaner: impl LogCleaner + Send + Sync + 'static,
        barrier: impl LoggingBarrier + Send + Sync + 'static,
    ) -> Self {
        Self {
            cleaner: Box::new(cleaner),
            barrier: Box::new(barrier),
        }
    }

    /// Decode `payload` and write its events. Returns the number written.
    pub fn ingest(&self, payload: &Payload) -> usize {
        self.write(&decode_payload(payload, self.cleaner.as_ref()))
    }

    /// Write every admitted event of `batch`. Returns the number written.
    pub fn write(&self, batch: &DecodedBatch) -> usize {
        let lines = self.admit(batch);
        for (level, line) in &lines {
            emit(*level, line);
        }
        lines.len()
    }

    /// Apply the barrier to `batch` and format the admitted events.
    ///
    /// Events at [`LogLevel::Off`] are never written.
    pub fn admit(&self, batch: &DecodedBatch) -> Vec<(LogLevel, String)> {
        if !self.barrier.allows_batch(&batch.events) {
            tracing::debug!("Barrier rejected batch of {} events", batch.events.len());
            return Vec::new();
        }
        batch
            .events
            .iter()
            .filter(|event| event.level != LogLevel::Off)
            .filter(|event| self.barrier.allows_event(event))
            .map(|event| (event.level, self.format_line(event, &batch.client_infos)))
            .collect()
    }

    pub fn format_line(&self, event: &DecodedEvent, infos: &ClientInfos) -> String {
        format!(
            "[{}] {} [{}]; Stack: {}",
            self.cleaner.clean_path(infos.base_url.as_deref().unwrap_or_default()),
            event,
            self.cleaner.clean(infos.user_agent.as_deref().unwrap_or_default()),
            event.stack.as_deref().unwrap_or("null")
        )
    }
}

fn emit(level: LogLevel, line: &str) {
    match level {
        LogLevel::Error => tracing::error!(target: "clientlog::collector", "{line}"),
        LogLevel::Warn => tracing::warn!(target: "clientlog::collector", "{line}"),
        LogLevel::Info => tracing::info!(target: "clientlog::collector", "{line}"),
        LogLevel::Debug => tracing::debug!(target: "clientlog::collector", "{line}"),
        LogLevel::Trace => tracing::trace!(target: "clientlog::collector", "{line}"),
        LogLevel::Off => {}
    }
}
