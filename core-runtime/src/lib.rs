//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the playback engine crates:
//! - Logging and tracing bootstrap
//! - Configuration (bridges, channel catalog, feature flags)
//! - Event bus for typed engine events
//!
//! The engine itself lives in `core-playback`; this crate holds nothing that
//! knows about playback state.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
