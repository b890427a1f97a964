//! Bridges over the host's global uncaught-error hook and external logger.
//!
//! Both hooks live in host-owned [`HookSlot`]s that other scripts may also
//! touch. Installation is a check-then-set on the slot: a hook whose
//! `is_bridged()` marker is already set is left alone, so repeated
//! initialisation never stacks wrappers or double-forwards.
//!
//! Failures raised by an original hook (returned errors or panics) are
//! discarded. The bridge must never break the page it is embedded in.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::core::config::HookMode;
use crate::core::facade::ClientLogger;
use crate::core::host::{ErrorHook, ExternalLogger, HookResult, HookSlot, UncaughtError};

// ── Pre-init capture ────────────────────────────────────────────────────

#[derive(Default)]
struct CaptureHook {
    buffer: RefCell<Vec<UncaughtError>>,
}

impl ErrorHook for CaptureHook {
    fn on_error(&self, error: &UncaughtError) -> HookResult {
        self.buffer.borrow_mut().push(error.clone());
        Ok(())
    }
}

/// Capture-only error hook installed while the page boots, before the
/// logger can be initialised.
///
/// Captured errors are handed to [`ClientLogger::initialize`], which replays
/// them oldest first through the installed bridge. Dropping the capture
/// without releasing it (for instance when the options fail to validate)
/// restores the original hook and discards whatever was captured.
pub struct EarlyErrorCapture {
    slot: HookSlot<dyn ErrorHook>,
    original: Option<Rc<dyn ErrorHook>>,
    hook: Rc<CaptureHook>,
    restored: bool,
}

impl EarlyErrorCapture {
    /// Take over `slot`, remembering its current occupant.
    pub fn install(slot: &HookSlot<dyn ErrorHook>) -> Self {
        let hook = Rc::new(CaptureHook::default());
        let installed: Rc<dyn ErrorHook> = hook.clone();
        let original = slot.replace(Some(installed));
        tracing::trace!("Early error capture installed");
        Self {
            slot: slot.clone(),
            original,
            hook,
            restored: false,
        }
    }

    /// Number of errors captured so far.
    pub fn captured(&self) -> usize {
        self.hook.buffer.borrow().len()
    }

    /// Restore the original hook and return the captured errors, oldest
    /// first.
    ///
    /// If another script replaced the capture in the meantime, its hook is
    /// kept and treated as the original.
    pub fn release(mut self) -> Vec<UncaughtError> {
        self.restore();
        self.hook.buffer.take()
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if self.slot.holds(&self.hook) {
            self.slot.replace(self.original.take());
        } else {
            tracing::debug!("Error hook replaced after capture was installed, keeping it");
        }
    }
}

impl Drop for EarlyErrorCapture {
    fn drop(&mut self) {
        if !self.restored {
            tracing::debug!(
                "Early error capture dropped without release, discarding {} errors",
                self.captured()
            );
            self.restore();
        }
    }
}

// ── Uncaught-error bridge ───────────────────────────────────────────────

/// Error hook that forwards uncaught errors to the logger.
pub struct BridgedErrorHook {
    logger: ClientLogger,
    original: Option<Rc<dyn ErrorHook>>,
    chain: bool,
}

impl ErrorHook for BridgedErrorHook {
    fn on_error(&self, error: &UncaughtError) -> HookResult {
        let seen = self.logger.record_uncaught();
        if seen == 1 || self.logger.settings().log_additional_errors {
            self.logger.log_uncaught(error);
        }

        if self.chain {
            if let Some(original) = &self.original {
                match catch_unwind(AssertUnwindSafe(|| original.on_error(error))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::trace!("Original error hook failed: {}", e),
                    Err(_) => tracing::trace!("Original error hook panicked"),
                }
            }
        }
        Ok(())
    }

    fn is_bridged(&self) -> bool {
        true
    }
}

/// Install [`BridgedErrorHook`] into `slot` according to `mode`.
///
/// Returns `true` if a bridge was installed.
pub fn install_error_bridge(
    logger: &ClientLogger,
    slot: &HookSlot<dyn ErrorHook>,
    mode: HookMode,
) -> bool {
    if !mode.is_enabled() {
        return false;
    }
    let original = slot.get();
    if original.as_ref().is_some_and(|hook| hook.is_bridged()) {
        tracing::debug!("Error hook already bridged, skipping");
        return false;
    }
    slot.set(Rc::new(BridgedErrorHook {
        logger: logger.clone(),
        original,
        chain: mode.chains_original(),
    }));
    tracing::debug!("Error hook bridged ({:?})", mode);
    true
}

// ── External logger bridge ──────────────────────────────────────────────

/// External logger that forwards `info`/`log` at INFO and `error` at ERROR.
pub struct BridgedLogger {
    logger: ClientLogger,
    original: Option<Rc<dyn ExternalLogger>>,
    chain: bool,
}

impl BridgedLogger {
    fn forward(&self, call: impl FnOnce(&dyn ExternalLogger)) {
        if !self.chain {
            return;
        }
        if let Some(original) = &self.original {
            call(original.as_ref());
        }
    }
}

impl ExternalLogger for BridgedLogger {
    fn enabled(&self) -> bool {
        self.original.as_ref().map_or(true, |o| o.enabled())
    }

    fn info(&self, message: &str) {
        self.logger.info(message);
        self.forward(|o| o.info(message));
    }

    fn error(&self, message: &str) {
        self.logger.error(message);
        self.forward(|o| o.error(message));
    }

    fn log(&self, message: &str) {
        self.logger.info(message);
        self.forward(|o| o.log(message));
    }

    fn is_bridged(&self) -> bool {
        true
    }
}

/// Install [`BridgedLogger`] into `slot` according to `mode`.
///
/// Returns `true` if a bridge was installed.
pub fn install_logger_bridge(
    logger: &ClientLogger,
    slot: &HookSlot<dyn ExternalLogger>,
    mode: HookMode,
) -> bool {
    if !mode.is_enabled() {
        return false;
    }
    let original = slot.get();
    if original.as_ref().is_some_and(|l| l.is_bridged()) {
        tracing::debug!("External logger already bridged, skipping");
        return false;
    }
    slot.set(Rc::new(BridgedLogger {
        logger: logger.clone(),
        original,
        chain: mode.chains_original(),
    }));
    tracing::debug!("External logger bridged ({:?})", mode);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_buffers_and_restores() {
        let slot: HookSlot<dyn ErrorHook> = HookSlot::default();
        let original: Rc<dyn ErrorHook> = Rc::new(|_: &UncaughtError| -> HookResult { Ok(()) });
        slot.set(original.clone());

        let capture = EarlyErrorCapture::install(&slot);
        slot.raise(&UncaughtError::new("first")).unwrap();
        slot.raise(&UncaughtError::new("second")).unwrap();
        assert_eq!(capture.captured(), 2);

        let errors = capture.release();
        assert!(slot.holds(&original));
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn test_release_keeps_foreign_replacement() {
        let slot: HookSlot<dyn ErrorHook> = HookSlot::default();
        let capture = EarlyErrorCapture::install(&slot);
        let foreign: Rc<dyn ErrorHook> = Rc::new(|_: &UncaughtError| -> HookResult { Ok(()) });
        slot.set(foreign.clone());
        assert!(capture.release().is_empty());
        assert!(slot.holds(&foreign));
    }

    #[test]
    fn test_drop_restores_original() {
        let slot: HookSlot<dyn ErrorHook> = HookSlot::default();
        let calls = Rc::new(std::cell::Cell::new(0));
        let counter = calls.clone();
        let original: Rc<dyn ErrorHook> = Rc::new(move |_: &UncaughtError| -> HookResult {
            counter.set(counter.get() + 1);
            Ok(())
        });
        slot.set(original.clone());

        let capture = EarlyErrorCapture::install(&slot);
        slot.raise(&UncaughtError::new("lost")).unwrap();
        drop(capture);

        assert!(slot.holds(&original));
        slot.raise(&UncaughtError::new("after")).unwrap();
        assert_eq!(calls.get(), 1);
    }
}
