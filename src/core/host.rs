//! Interfaces to everything the logger does not own: the network transport,
//! the page environment, timers and page lifecycle signals, and the two
//! pre-existing global hooks it bridges.
//!
//! Each seam is a trait so the same engine runs against a real host binding
//! or the in-memory implementations provided here for tests and the demo
//! binary.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::core::level::LogLevel;
use crate::core::store::KeyValueStore;
use crate::export::payload::Payload;
use crate::util::constants::{APP_NAME, APP_VERSION};

// ── Transport ───────────────────────────────────────────────────────────

/// Whether the host may complete the request in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    Async,
    /// Used at unload, where background work may not finish.
    Sync,
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub payload: Payload,
    pub mode: SendMode,
}

/// Fire-and-forget delivery. Implementations must not report failures back.
pub trait Transport {
    fn send(&self, request: TransportRequest);
}

/// Transport that hands requests to a [`crossbeam_channel`] receiver.
///
/// Tests drain the receiver to inspect what was sent; the demo binary moves
/// it onto a delivery thread.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: Sender<TransportRequest>,
}

impl ChannelTransport {
    pub fn new() -> (Self, Receiver<TransportRequest>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, request: TransportRequest) {
        if self.sender.send(request).is_err() {
            tracing::debug!("Transport receiver dropped, request discarded");
        }
    }
}

// ── Environment ─────────────────────────────────────────────────────────

/// Facts about the page and the client it runs in.
pub trait Environment {
    fn user_agent(&self) -> String;

    /// Viewport size as `(width, height)`.
    fn viewport(&self) -> (u32, u32);

    /// Available screen size as `(width, height)`.
    fn screen(&self) -> (u32, u32);

    /// Base path of the transport, if the host knows one.
    fn base_path(&self) -> Option<String> {
        None
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Current stack trace, when the host can produce one.
    fn capture_stack(&self) -> Option<String> {
        None
    }

    /// Console sink used when the `debug` option is set.
    fn console(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "clientlog::console", "{line}"),
            LogLevel::Warn => tracing::warn!(target: "clientlog::console", "{line}"),
            LogLevel::Info => tracing::info!(target: "clientlog::console", "{line}"),
            LogLevel::Debug => tracing::debug!(target: "clientlog::console", "{line}"),
            LogLevel::Trace | LogLevel::Off => {
                tracing::trace!(target: "clientlog::console", "{line}")
            }
        }
    }
}

/// Environment of the running process: wall clock, native backtraces and a
/// tracing-backed console.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    pub viewport: (u32, u32),
    pub screen: (u32, u32),
    pub base_path: Option<String>,
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        Self {
            viewport: (1280, 800),
            screen: (1920, 1080),
            base_path: None,
        }
    }
}

impl Environment for SystemEnvironment {
    fn user_agent(&self) -> String {
        format!("{APP_NAME}/{APP_VERSION} ({})", std::env::consts::OS)
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn screen(&self) -> (u32, u32) {
        self.screen
    }

    fn base_path(&self) -> Option<String> {
        self.base_path.clone()
    }

    fn capture_stack(&self) -> Option<String> {
        Some(std::backtrace::Backtrace::force_capture().to_string())
    }
}

/// Fixed environment whose console output is recorded instead of printed.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    user_agent: String,
    viewport: (u32, u32),
    screen: (u32, u32),
    base_path: Option<String>,
    now: Option<DateTime<Utc>>,
    stack: Option<String>,
    console: RefCell<Vec<(LogLevel, String)>>,
}

impl StaticEnvironment {
    pub fn new(user_agent: impl Into<String>, viewport: (u32, u32), screen: (u32, u32)) -> Self {
        Self {
            user_agent: user_agent.into(),
            viewport,
            screen,
            ..Self::default()
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Freeze the clock at `now`.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Provide a stack-capture facility returning `stack`.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Lines written to the console sink so far.
    pub fn console_lines(&self) -> Vec<(LogLevel, String)> {
        self.console.borrow().clone()
    }
}

impl Environment for StaticEnvironment {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn screen(&self) -> (u32, u32) {
        self.screen
    }

    fn base_path(&self) -> Option<String> {
        self.base_path.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn capture_stack(&self) -> Option<String> {
        self.stack.clone()
    }

    fn console(&self, level: LogLevel, line: &str) {
        self.console.borrow_mut().push((level, line.to_owned()));
    }
}

// ── Hooks ───────────────────────────────────────────────────────────────

/// Result returned by host hooks. Errors from original hooks are discarded
/// by the bridge.
pub type HookResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// An uncaught runtime error as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncaughtError {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl UncaughtError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Message forwarded to the dispatcher: `"<msg> on [<file>:<line>]"`.
    pub fn describe(&self) -> String {
        format!(
            "{} on [{}:{}]",
            self.message,
            self.file.as_deref().unwrap_or_default(),
            self.line.map(|l| l.to_string()).unwrap_or_default()
        )
    }
}

/// The host's global uncaught-error handler.
pub trait ErrorHook {
    fn on_error(&self, error: &UncaughtError) -> HookResult;

    /// Marker set by hooks installed by this crate.
    fn is_bridged(&self) -> bool {
        false
    }
}

impl<F> ErrorHook for F
where
    F: Fn(&UncaughtError) -> HookResult,
{
    fn on_error(&self, error: &UncaughtError) -> HookResult {
        self(error)
    }
}

/// The host's pre-existing logger facade.
pub trait ExternalLogger {
    fn enabled(&self) -> bool;
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn log(&self, message: &str);

    /// Marker set by loggers installed by this crate.
    fn is_bridged(&self) -> bool {
        false
    }
}

/// A host-owned, single-occupant slot holding a global hook.
///
/// Clones share the same slot.
pub struct HookSlot<T: ?Sized> {
    inner: Rc<RefCell<Option<Rc<T>>>>,
}

impl<T: ?Sized> HookSlot<T> {
    pub fn new(initial: Option<Rc<T>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(initial)),
        }
    }

    /// The current occupant.
    pub fn get(&self) -> Option<Rc<T>> {
        self.inner.borrow().clone()
    }

    /// Swap in `hook`, returning the previous occupant.
    pub fn replace(&self, hook: Option<Rc<T>>) -> Option<Rc<T>> {
        std::mem::replace(&mut *self.inner.borrow_mut(), hook)
    }

    pub fn set(&self, hook: Rc<T>) {
        self.replace(Some(hook));
    }

    /// Returns `true` if the slot currently holds exactly `hook`.
    pub fn holds<U: ?Sized>(&self, hook: &Rc<U>) -> bool {
        self.inner
            .borrow()
            .as_ref()
            .is_some_and(|current| std::ptr::addr_eq(Rc::as_ptr(current), Rc::as_ptr(hook)))
    }
}

impl<T: ?Sized> Clone for HookSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> Default for HookSlot<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HookSlot<dyn ErrorHook> {
    /// Report an uncaught error to whichever hook owns the slot, as the host
    /// runtime would.
    pub fn raise(&self, error: &UncaughtError) -> HookResult {
        // clone out first so the hook may swap the slot
        match self.get() {
            Some(hook) => hook.on_error(error),
            None => Ok(()),
        }
    }
}

// ── Scheduler ───────────────────────────────────────────────────────────

/// Timers and page lifecycle signals.
pub trait Scheduler {
    /// Run `callback` every `every` for the lifetime of the page.
    fn set_interval(&self, every: Duration, callback: Box<dyn FnMut()>);

    /// Run `callback` once after `after`.
    fn set_timeout(&self, after: Duration, callback: Box<dyn FnOnce()>);

    /// Run `callback` when the page starts unloading.
    fn on_unload(&self, callback: Box<dyn FnMut()>);

    /// Run `callback` once the page has finished loading.
    fn on_load_complete(&self, callback: Box<dyn FnOnce()>);
}

struct Interval {
    every: Duration,
    next_due: Duration,
    callback: Option<Box<dyn FnMut()>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    intervals: Vec<Interval>,
    timeouts: Vec<(Duration, Box<dyn FnOnce()>)>,
    unload: Vec<Box<dyn FnMut()>>,
    load: Vec<Box<dyn FnOnce()>>,
}

enum Due {
    Interval(usize, Duration),
    Timeout(usize, Duration),
}

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing fires on its own: [`ManualScheduler::advance`] runs every timer
/// that falls due, in due order, and the lifecycle signals are raised with
/// [`ManualScheduler::fire_unload`] and [`ManualScheduler::fire_load_complete`].
#[derive(Default)]
pub struct ManualScheduler {
    state: RefCell<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of registered intervals plus pending timeouts.
    pub fn pending_timers(&self) -> usize {
        let state = self.state.borrow();
        state.intervals.len() + state.timeouts.len()
    }

    /// Move the clock forward by `by`, firing everything that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        while let Some(due) = self.next_due(target) {
            match due {
                Due::Interval(idx, at) => {
                    let callback = {
                        let mut state = self.state.borrow_mut();
                        state.now = at;
                        state.intervals[idx].callback.take()
                    };
                    if let Some(mut callback) = callback {
                        callback();
                        let mut state = self.state.borrow_mut();
                        let interval = &mut state.intervals[idx];
                        interval.next_due += interval.every;
                        interval.callback = Some(callback);
                    }
                }
                Due::Timeout(idx, at) => {
                    let (_, callback) = {
                        let mut state = self.state.borrow_mut();
                        state.now = at;
                        state.timeouts.remove(idx)
                    };
                    callback();
                }
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Earliest timer due at or before `target`. Ties go to the timer
    /// registered first, intervals before timeouts.
    fn next_due(&self, target: Duration) -> Option<Due> {
        let state = self.state.borrow();
        let interval = state
            .intervals
            .iter()
            .enumerate()
            .filter(|(_, i)| i.callback.is_some() && i.next_due <= target)
            .min_by_key(|(_, i)| i.next_due)
            .map(|(idx, i)| (idx, i.next_due));
        let timeout = state
            .timeouts
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= target)
            .min_by_key(|(_, (due, _))| *due)
            .map(|(idx, (due, _))| (idx, *due));

        match (interval, timeout) {
            (Some((i, at)), Some((_, t_at))) if at <= t_at => Some(Due::Interval(i, at)),
            (_, Some((t, t_at))) => Some(Due::Timeout(t, t_at)),
            (Some((i, at)), None) => Some(Due::Interval(i, at)),
            (None, None) => None,
        }
    }

    /// Raise the page-unload signal.
    pub fn fire_unload(&self) {
        let mut callbacks = std::mem::take(&mut self.state.borrow_mut().unload);
        for callback in callbacks.iter_mut() {
            callback();
        }
        let mut state = self.state.borrow_mut();
        callbacks.append(&mut state.unload);
        state.unload = callbacks;
    }

    /// Raise the load-complete signal. Each listener runs at most once.
    pub fn fire_load_complete(&self) {
        let callbacks = std::mem::take(&mut self.state.borrow_mut().load);
        for callback in callbacks {
            callback();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn set_interval(&self, every: Duration, callback: Box<dyn FnMut()>) {
        let every = every.max(Duration::from_millis(1));
        let mut state = self.state.borrow_mut();
        let next_due = state.now + every;
        state.intervals.push(Interval {
            every,
            next_due,
            callback: Some(callback),
        });
    }

    fn set_timeout(&self, after: Duration, callback: Box<dyn FnOnce()>) {
        let mut state = self.state.borrow_mut();
        let due = state.now + after;
        state.timeouts.push((due, callback));
    }

    fn on_unload(&self, callback: Box<dyn FnMut()>) {
        self.state.borrow_mut().unload.push(callback);
    }

    fn on_load_complete(&self, callback: Box<dyn FnOnce()>) {
        self.state.borrow_mut().load.push(callback);
    }
}

// ── Host bundle ─────────────────────────────────────────────────────────

/// Everything the logger needs from the page it runs in.
#[derive(Clone)]
pub struct Host {
    pub transport: Rc<dyn Transport>,
    pub environment: Rc<dyn Environment>,
    pub scheduler: Rc<dyn Scheduler>,
    /// Required only by the `localstorage` strategy.
    pub store: Option<Rc<dyn KeyValueStore>>,
    pub error_hook: HookSlot<dyn ErrorHook>,
    pub external_logger: HookSlot<dyn ExternalLogger>,
}

impl Host {
    /// A host with no store and empty hook slots.
    pub fn new(
        transport: Rc<dyn Transport>,
        environment: Rc<dyn Environment>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            transport,
            environment,
            scheduler,
            store: None,
            error_hook: HookSlot::default(),
            external_logger: HookSlot::default(),
        }
    }

    pub fn with_store(mut self, store: Rc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }
}
