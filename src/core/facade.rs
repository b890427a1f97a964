//! Public logging facade and the one-time `initialize` entry point.
//!
//! [`ClientLogger`] is a cheap, cloneable handle. Every clone shares one
//! dispatcher, so the handle can be captured by timers, lifecycle listeners
//! and the hook bridges.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::bridge::{install_error_bridge, install_logger_bridge, EarlyErrorCapture};
use crate::core::config::Settings;
use crate::core::dispatcher::{Dispatcher, OutgoingBatch};
use crate::core::event_record::{EventRecord, SourceLocation};
use crate::core::host::{
    Environment, Host, Scheduler, SendMode, Transport, TransportRequest, UncaughtError,
};
use crate::core::level::LogLevel;
use crate::core::strategy::{build_strategy, FlushTriggers};
use crate::util::error::Result;
use crate::util::time::format_millis;

struct Inner {
    settings: Rc<Settings>,
    environment: Rc<dyn Environment>,
    transport: Rc<dyn Transport>,
    dispatcher: RefCell<Dispatcher>,
    uncaught_errors: Cell<usize>,
}

/// Handle to an initialised client logger.
#[derive(Clone)]
pub struct ClientLogger {
    inner: Rc<Inner>,
}

impl ClientLogger {
    /// Wire a logger into `host`.
    ///
    /// Builds the collection strategy, registers its flush triggers with the
    /// host scheduler, bridges the error hook and external logger, and
    /// replays any errors held by `capture`.
    ///
    /// # Errors
    /// Returns [`crate::util::error::ClientLogError::StoreUnavailable`] when
    /// the `localstorage` strategy is selected without a usable store. In
    /// that case nothing is installed and `capture` is released, restoring
    /// the original error hook.
    pub fn initialize(
        settings: Settings,
        host: &Host,
        capture: Option<EarlyErrorCapture>,
    ) -> Result<Self> {
        let strategy = match build_strategy(&settings, host.store.clone()) {
            Ok(strategy) => strategy,
            Err(e) => {
                if let Some(capture) = capture {
                    capture.release();
                }
                return Err(e);
            }
        };
        let triggers = strategy.flush_triggers();
        let settings = Rc::new(settings);

        let logger = Self {
            inner: Rc::new(Inner {
                settings: Rc::clone(&settings),
                environment: Rc::clone(&host.environment),
                transport: Rc::clone(&host.transport),
                dispatcher: RefCell::new(Dispatcher::new(
                    Rc::clone(&settings),
                    Rc::clone(&host.environment),
                    strategy,
                )),
                uncaught_errors: Cell::new(0),
            }),
        };

        let captured = capture.map(EarlyErrorCapture::release).unwrap_or_default();

        logger.wire_triggers(&host.scheduler, triggers);
        install_error_bridge(&logger, &host.error_hook, settings.window_on_error);
        install_logger_bridge(&logger, &host.external_logger, settings.wicket_log);

        if !captured.is_empty() {
            tracing::info!("Replaying {} errors raised before initialisation", captured.len());
            for error in &captured {
                if let Err(e) = host.error_hook.raise(error) {
                    tracing::trace!("Error hook failed during replay: {}", e);
                }
            }
        }

        tracing::info!(
            "Client logging initialised: {} collection, threshold {}, target {} {}",
            settings.collection_type,
            settings.log_level,
            settings.method,
            settings.url
        );
        Ok(logger)
    }

    fn wire_triggers(&self, scheduler: &Rc<dyn Scheduler>, triggers: FlushTriggers) {
        if let Some(every) = triggers.interval {
            let logger = self.clone();
            scheduler.set_interval(every, Box::new(move || logger.flush(SendMode::Async)));
            tracing::debug!("Flushing every {}", format_millis(every));
        }

        if triggers.on_unload || self.inner.settings.flush_messages_on_unload {
            let logger = self.clone();
            scheduler.on_unload(Box::new(move || logger.flush(SendMode::Sync)));
        }

        if let Some(delay) = triggers.after_load {
            let logger = self.clone();
            let weak: Weak<dyn Scheduler> = Rc::downgrade(scheduler);
            scheduler.on_load_complete(Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.set_timeout(delay, Box::new(move || logger.flush(SendMode::Async)));
                }
            }));
        }
    }

    /// Log at ERROR, capturing a stack when `logStacktrace` is set and the
    /// environment can produce one.
    pub fn error(&self, message: impl Into<String>) {
        self.log_with(LogLevel::Error, message.into(), true, SourceLocation::default());
    }

    /// Log at ERROR without attempting stack capture.
    pub fn error_without_stack(&self, message: impl Into<String>) {
        self.log_with(LogLevel::Error, message.into(), false, SourceLocation::default());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    /// Log at an arbitrary level. No stack is captured. Calls at
    /// [`LogLevel::Off`] are ignored.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log_with(level, message.into(), false, SourceLocation::default());
    }

    /// Flush whatever the active strategy has buffered.
    pub fn flush(&self, mode: SendMode) {
        let outgoing = self.inner.dispatcher.borrow_mut().flush(mode);
        self.send(outgoing);
    }

    pub fn is_logging_active(&self, level: LogLevel) -> bool {
        self.inner.dispatcher.borrow().is_logging_active(level)
    }

    /// Events sent on this page.
    pub fn sent_count(&self) -> usize {
        self.inner.dispatcher.borrow().sent_count()
    }

    /// Events waiting for a flush.
    pub fn pending(&self) -> usize {
        self.inner.dispatcher.borrow().pending()
    }

    /// Uncaught errors seen by the bridge on this page, logged or not.
    pub fn uncaught_error_count(&self) -> usize {
        self.inner.uncaught_errors.get()
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Count one uncaught error and return the running total.
    pub(crate) fn record_uncaught(&self) -> usize {
        let seen = self.inner.uncaught_errors.get() + 1;
        self.inner.uncaught_errors.set(seen);
        seen
    }

    /// Forward an uncaught error at ERROR, with its source location and no stack.
    pub(crate) fn log_uncaught(&self, error: &UncaughtError) {
        self.log_with(
            LogLevel::Error,
            error.describe(),
            false,
            SourceLocation {
                file: error.file.clone(),
                line: error.line,
            },
        );
    }

    fn log_with(&self, level: LogLevel, message: String, stack: bool, source: SourceLocation) {
        if level == LogLevel::Off {
            tracing::trace!("Ignoring log call at level off: {}", message);
            return;
        }
        let settings = &self.inner.settings;
        let env = self.inner.environment.as_ref();
        let active = self.is_logging_active(level);

        let stack = if active && stack && settings.log_stacktrace {
            env.capture_stack()
        } else {
            None
        };
        let record = EventRecord::new(level, message, settings.timestamp_format.render(&env.now()))
            .with_stack(stack)
            .with_source(source);

        if settings.debug {
            env.console(level, &record.console_line());
        }

        if active {
            let outgoing = self.inner.dispatcher.borrow_mut().submit(record);
            self.send(outgoing);
        }
    }

    /// Hand a batch to the transport. Called with the dispatcher released.
    fn send(&self, outgoing: Option<OutgoingBatch>) {
        let Some(batch) = outgoing else {
            return;
        };
        let settings = &self.inner.settings;
        self.inner.transport.send(TransportRequest {
            method: settings.method.clone(),
            url: settings.url.clone(),
            payload: batch.payload,
            mode: batch.mode,
        });
    }
}
