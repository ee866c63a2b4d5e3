//! Audio output primitives provided by the host.
//!
//! Two shapes exist because hosts expose audio very differently:
//!
//! - [`NativePlayer`]: a native media session (queue-based player with an
//!   event channel that also carries in-band stream metadata).
//! - [`AudioElementFactory`] / [`AudioElement`]: a browser-style media element
//!   driven through `src`/`load()`/`play()`/`pause()`.
//!
//! The playback engine wraps each in its own transport adapter and picks one at
//! startup. Neither primitive is expected to support seeking; every source is a
//! live stream.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{BridgeError, Result};

/// A named failure surfaced by a media primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFailure {
    /// Host error identifier (`NotAllowedError`, `NetworkError`, ...)
    pub name: String,
    pub message: String,
}

impl MediaFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<MediaFailure> for BridgeError {
    fn from(failure: MediaFailure) -> Self {
        BridgeError::Media {
            name: failure.name,
            message: failure.message,
        }
    }
}

/// Source handed to a native player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSource {
    pub url: String,
    pub title: String,
    /// Tells the host there is no duration and no seek support.
    pub is_live: bool,
}

impl LiveSource {
    pub fn live(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            is_live: true,
        }
    }
}

/// Play state reported by a native player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    None,
    Loading,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

/// In-band (ICY) metadata delivered by the stream itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InBandMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Unparsed `StreamTitle` value when the host does not split it.
    pub raw: Option<String>,
}

/// Events emitted by a native player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    StateChanged(PlayerState),
    Error(MediaFailure),
    Metadata(InBandMetadata),
}

/// Native media session.
#[async_trait]
pub trait NativePlayer: Send + Sync {
    /// Create the player and configure the audio session. Called once per
    /// transport lifetime.
    async fn initialize(&self) -> Result<()>;

    /// Drop whatever is queued and stop output.
    async fn reset(&self) -> Result<()>;

    /// Queue a single live source.
    async fn load(&self, source: LiveSource) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Current play state as the host sees it.
    async fn state(&self) -> Result<PlayerState>;

    /// Register for player events. The returned stream ends when the player is
    /// released.
    async fn subscribe_events(&self) -> Result<Box<dyn PlayerEventStream>>;

    /// Release the player and its audio session.
    async fn release(&self) -> Result<()>;
}

/// Stream of native player events.
#[async_trait]
pub trait PlayerEventStream: Send {
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<PlayerEvent>;
}

/// Events emitted by a media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    Playing,
    Pause,
    Waiting,
    Stalled,
    Ended,
    Emptied,
    Error(MediaFailure),
}

/// Creates media elements.
#[async_trait]
pub trait AudioElementFactory: Send + Sync {
    async fn create_element(&self) -> Result<Arc<dyn AudioElement>>;
}

/// Browser-style media element.
#[async_trait]
pub trait AudioElement: Send + Sync {
    async fn set_source(&self, url: &str) -> Result<()>;

    /// Detach the current source (`removeAttribute("src")`).
    async fn clear_source(&self) -> Result<()>;

    async fn load(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn is_paused(&self) -> bool;

    async fn subscribe_events(&self) -> Result<Box<dyn ElementEventStream>>;
}

/// Stream of media element events.
#[async_trait]
pub trait ElementEventStream: Send {
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<ElementEvent>;
}
