//! The dispatcher: admission, buffering through the active strategy, and
//! batch encoding.
//!
//! The dispatcher never calls the transport itself. [`Dispatcher::submit`]
//! and [`Dispatcher::flush`] return the encoded [`OutgoingBatch`] after the
//! source queue has been drained, and the caller sends it once it no longer
//! borrows the dispatcher. An event submitted while a batch is in flight
//! therefore always lands in the next batch.
//!
//! Delivery is fire-and-forget: a batch handed to the transport counts as
//! sent, and transport failures are neither retried nor reported.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::core::config::Settings;
use crate::core::event_record::EventRecord;
use crate::core::host::{Environment, SendMode};
use crate::core::level::LogLevel;
use crate::core::strategy::{CollectionStrategy, SubmitOutcome};
use crate::export::payload::{encode_batch, ClientInfos, EncodeOptions, Payload};
use crate::util::constants::DEFAULT_BASE_PATH;

/// An encoded batch ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingBatch {
    pub payload: Payload,
    pub mode: SendMode,
    /// Number of events in `payload`.
    pub events: usize,
}

/// Owns the in-memory queue and the per-page sent counter.
pub struct Dispatcher {
    settings: Rc<Settings>,
    environment: Rc<dyn Environment>,
    strategy: Box<dyn CollectionStrategy>,
    queue: Vec<EventRecord>,
    sent_count: usize,
}

impl Dispatcher {
    pub fn new(
        settings: Rc<Settings>,
        environment: Rc<dyn Environment>,
        strategy: Box<dyn CollectionStrategy>,
    ) -> Self {
        Self {
            settings,
            environment,
            strategy,
            queue: Vec::new(),
            sent_count: 0,
        }
    }

    /// Whether an event at `level` would currently be accepted.
    ///
    /// Requires the threshold to admit `level` and, with `maxEntriesPerPage`
    /// set, `sent + pending` to be below the cap.
    pub fn is_logging_active(&self, level: LogLevel) -> bool {
        if !self.settings.log_level.admits(level) {
            return false;
        }
        match self.settings.max_entries_per_page {
            Some(cap) => self.sent_count + self.pending() < cap,
            None => true,
        }
    }

    /// Accept `record` into the active strategy.
    ///
    /// Returns a batch when the strategy asked for an immediate flush.
    /// Inactive records are dropped silently.
    pub fn submit(&mut self, record: EventRecord) -> Option<OutgoingBatch> {
        if !self.is_logging_active(record.level()) {
            tracing::trace!("Dropping {} event, logging inactive", record.level());
            return None;
        }
        match self.strategy.on_submit(record, &mut self.queue) {
            SubmitOutcome::Flush => self.flush(SendMode::Async),
            SubmitOutcome::Buffered | SubmitOutcome::Dropped => None,
        }
    }

    /// Drain the strategy's source into one batch.
    ///
    /// Events rejected by the custom filter are removed without being sent.
    /// Returns `None` when nothing is left to send.
    pub fn flush(&mut self, mode: SendMode) -> Option<OutgoingBatch> {
        let drained = self.strategy.take_batch(&mut self.queue);
        if drained.is_empty() {
            return None;
        }
        let total = drained.len();

        let accepted: Vec<EventRecord> = drained
            .into_iter()
            .filter(|record| self.passes_filter(record))
            .collect();
        if accepted.is_empty() {
            tracing::debug!("All {} queued events rejected by custom filter", total);
            return None;
        }

        let payload = encode_batch(&accepted, &self.encode_options());
        self.sent_count += accepted.len();

        tracing::debug!(
            "Flushing {} of {} events ({}, {:?}), {} sent this page",
            accepted.len(),
            total,
            self.strategy.kind(),
            mode,
            self.sent_count
        );

        Some(OutgoingBatch {
            payload,
            mode,
            events: accepted.len(),
        })
    }

    /// Events included in sent payloads on this page.
    pub fn sent_count(&self) -> usize {
        self.sent_count
    }

    /// Events waiting in the strategy's source.
    pub fn pending(&self) -> usize {
        self.strategy.pending(&self.queue)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A panicking filter rejects the event.
    fn passes_filter(&self, record: &EventRecord) -> bool {
        let Some(filter) = self.settings.custom_filter() else {
            return true;
        };
        catch_unwind(AssertUnwindSafe(|| filter(record))).unwrap_or_else(|_| {
            tracing::warn!("Custom filter panicked, rejecting event: {}", record.message());
            false
        })
    }

    fn encode_options(&self) -> EncodeOptions {
        let env = self.environment.as_ref();
        let mut client_infos = ClientInfos {
            base_url: Some(
                env.base_path()
                    .unwrap_or_else(|| DEFAULT_BASE_PATH.to_owned()),
            ),
            ..ClientInfos::default()
        };
        if self.settings.collect_client_infos {
            client_infos.user_agent = Some(env.user_agent());
            client_infos.window_size = Some(ClientInfos::size(env.viewport()));
            client_infos.screen_size = Some(ClientInfos::size(env.screen()));
        }
        EncodeOptions {
            include_stack: self.settings.log_stacktrace,
            client_infos,
        }
    }
}
