//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback engine and the
//! platform-specific pieces it depends on but does not own: the audio output
//! primitive, connectivity and lifecycle signals, HTTP, and wall-clock time.
//!
//! ## Traits
//!
//! ### Audio Output
//! - [`NativePlayer`](media::NativePlayer) - Native media session with in-band metadata events
//! - [`AudioElementFactory`](media::AudioElementFactory) - Browser-style media elements
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity transitions
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - App foreground/background transitions
//! - [`HttpClient`](http::HttpClient) - Now-playing feed requests
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Audio primitive |
//! |----------|---------------------|-----------------|
//! | Desktop  | `bridge-desktop`    | host supplied   |
//! | iOS      | host app            | `NativePlayer`  |
//! | Android  | host app            | `NativePlayer`  |
//! | Web      | host app            | `AudioElementFactory` |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Media primitives
//! should report failures as [`BridgeError::Media`] with the host's error name
//! so the engine can classify them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod network;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use media::{
    AudioElement, AudioElementFactory, ElementEvent, ElementEventStream, InBandMetadata,
    LiveSource, MediaFailure, NativePlayer, PlayerEvent, PlayerEventStream, PlayerState,
};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
