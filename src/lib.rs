//! clientlog library crate.
//!
//! Captures log calls and uncaught errors, buffers them under a configurable
//! collection strategy and relays them to a backend collector. The demo
//! binary entry point is in `main.rs`.

pub mod core;
pub mod export;
pub mod util;

pub use crate::core::bridge::EarlyErrorCapture;
pub use crate::core::config::{ClientLogOptions, Settings};
pub use crate::core::facade::ClientLogger;
pub use crate::core::host::Host;
pub use crate::core::level::LogLevel;
pub use crate::util::error::{ClientLogError, Result};
