//! Shared utilities: constants, error types, timestamp helpers and the
//! collector-side value cleaner.

pub mod cleaner;
pub mod constants;
pub mod error;
pub mod time;
