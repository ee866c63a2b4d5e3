//! # Playback Reliability Engine
//!
//! Keeps a live radio stream playing across flaky networks, host interruptions
//! and app backgrounding.
//!
//! ## Overview
//!
//! This module handles:
//! - The playback state machine with request fencing and retry/backoff
//! - Native and web stream transports behind one [`StreamTransport`] trait
//! - Periodic playback verification ([`HealthMonitor`])
//! - Foreground/background and connectivity recovery ([`LifecycleWatchdog`])
//! - Now-playing metadata from in-band pushes and the HTTP feed
//!
//! All collaborators observe the engine's [`PlaybackSnapshot`] through a
//! `tokio::sync::watch` channel and act only through engine intents.

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod fence;
pub mod health;
pub mod metadata;
pub mod state;
pub mod transport;
pub mod watchdog;

pub use config::{HealthCheckConfig, MetadataConfig, PlaybackConfig, RetryPolicy, WatchdogConfig};
pub use engine::{PlayOutcome, PlaybackEngine, ReconnectReason};
pub use error::{classify, CategorizedError, ErrorCategory, PlaybackError, Result};
pub use health::HealthMonitor;
pub use metadata::{MetadataArbitrator, NowPlayingPoller};
pub use state::{PlaybackSnapshot, PlaybackStatus, StreamMetadata, StreamSelection};
pub use transport::{
    select_transport, StreamTransport, TransportCapabilities, TransportEvent, TransportKind,
};
pub use watchdog::LifecycleWatchdog;
