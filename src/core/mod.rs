//! Core domain modules for clientlog.
//!
//! Contains the event data model, configuration, collection strategies, the
//! dispatcher, the hook bridges and the public logging facade, plus the
//! interfaces to the host page.

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod event_record;
pub mod facade;
pub mod host;
pub mod level;
pub mod store;
pub mod strategy;
