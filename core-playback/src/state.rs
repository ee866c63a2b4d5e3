//! # Playback State
//!
//! The snapshot the engine publishes to observers.

use crate::error::CategorizedError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback status. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    /// Whether a selection must exist in this status.
    pub fn requires_selection(self) -> bool {
        !matches!(self, PlaybackStatus::Idle)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// The stream the user intends to hear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSelection {
    pub url: String,
    pub display_name: String,
}

impl StreamSelection {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
        }
    }
}

/// Now-playing information for the selected stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl StreamMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none()
    }

    /// Composite `artist|title` key used to detect changes between polls.
    pub fn change_key(&self) -> String {
        format!(
            "{}|{}",
            self.artist.as_deref().unwrap_or_default(),
            self.title.as_deref().unwrap_or_default()
        )
    }
}

/// Read-only view of the engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub current_stream_url: Option<String>,
    pub current_stream_name: Option<String>,
    pub stream_metadata: StreamMetadata,
    pub error: Option<CategorizedError>,
    pub retry_count: u32,
    pub is_retrying: bool,
    /// Bumped on every entry into `playing`.
    #[serde(skip)]
    pub playing_episode: u64,
}

impl PlaybackSnapshot {
    pub fn selection(&self) -> Option<StreamSelection> {
        match (&self.current_stream_url, &self.current_stream_name) {
            (Some(url), Some(name)) => Some(StreamSelection::new(url.clone(), name.clone())),
            (Some(url), None) => Some(StreamSelection::new(url.clone(), String::new())),
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Whether `url` is already playing or connecting.
    pub fn is_active_on(&self, url: &str) -> bool {
        self.current_stream_url.as_deref() == Some(url)
            && matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Loading)
    }
}
