//! # Stream Transport Adapters
//!
//! A [`StreamTransport`] owns one host audio primitive and drives it for live
//! streams. Two adapters exist:
//!
//! - [`NativeTransport`] over a [`NativePlayer`] (mobile media sessions)
//! - [`WebTransport`] over an [`AudioElementFactory`] (browser audio elements)
//!
//! [`select_transport`] probes the injected capabilities once at startup.
//!
//! Both adapters fence their own `play()` calls with a request id, independent of
//! the state machine's fence, so a superseded `play()` stops touching the
//! primitive and pauses output it already started.

mod native;
mod setup;
mod web;

pub use native::NativeTransport;
pub use web::WebTransport;

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::media::{AudioElementFactory, InBandMetadata, MediaFailure, NativePlayer, PlayerState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of each transport's event channel.
pub(crate) const TRANSPORT_EVENT_CAPACITY: usize = 32;

/// Which adapter is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    Native,
    Web,
}

/// Low-level events forwarded from the primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(PlayerState),
    Error(MediaFailure),
    /// In-band stream metadata. Only native transports emit this.
    Metadata(InBandMetadata),
}

/// Per-platform driver for a live audio stream.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Initialize the primitive and register listeners.
    ///
    /// Idempotent; concurrent callers share one in-flight initialization.
    /// Returns `false` when initialization failed; a later call retries.
    async fn setup(&self) -> bool;

    /// Load `url` at the live edge and start output.
    ///
    /// Returns [`PlaybackError::Superseded`] when a newer `play()` replaced this one.
    async fn play(&self, url: &str, title: &str) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Stop output and cancel any in-flight `play()`.
    async fn stop(&self) -> Result<()>;

    /// Pause when playing, otherwise reload the live edge. Returns whether the
    /// transport is now playing.
    async fn toggle_playback(&self) -> Result<bool>;

    /// Release listeners and the primitive. Safe before `setup()` completes.
    async fn destroy(&self) -> Result<()>;

    /// Whether audio is actually coming out, as reported by the primitive.
    async fn verify_playback(&self) -> bool;

    /// Reload the last played stream from the live edge.
    async fn reconnect_stream(&self) -> Result<()>;

    /// Subscribe to forwarded primitive events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Host primitives available for audio output.
#[derive(Clone, Default)]
pub struct TransportCapabilities {
    pub native_player: Option<Arc<dyn NativePlayer>>,
    pub audio_elements: Option<Arc<dyn AudioElementFactory>>,
}

impl std::fmt::Debug for TransportCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCapabilities")
            .field("native_player", &self.native_player.is_some())
            .field("audio_elements", &self.audio_elements.is_some())
            .finish()
    }
}

/// Pick the transport for the host, preferring a native player.
pub fn select_transport(capabilities: TransportCapabilities) -> Result<Arc<dyn StreamTransport>> {
    if let Some(player) = capabilities.native_player {
        tracing::info!(transport = "native", "Selected stream transport");
        return Ok(Arc::new(NativeTransport::new(player)));
    }
    if let Some(factory) = capabilities.audio_elements {
        tracing::info!(transport = "web", "Selected stream transport");
        return Ok(Arc::new(WebTransport::new(factory)));
    }
    Err(PlaybackError::InvalidConfig(
        "no audio primitive available: provide a NativePlayer or an AudioElementFactory"
            .to_string(),
    ))
}
