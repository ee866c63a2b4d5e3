//! # Core Configuration Module
//!
//! Builder-based configuration for the radio playback core.
//!
//! ## Overview
//!
//! `CoreConfig` holds every host bridge the engine talks to plus the channel
//! catalog and feature switches. `build()` validates fail-fast so a missing
//! capability surfaces at startup rather than on first play.
//!
//! ## Required Dependencies
//!
//! - At least one transport primitive: `NativePlayer` or `AudioElementFactory`
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - now-playing feed polling (desktop default: reqwest)
//! - `NetworkMonitor` - connectivity tracking (desktop default: TCP probe)
//! - `LifecycleObserver` - foreground/background transitions (desktop default: always active)
//! - `Clock` - metadata priority window (default: system clock)
//! - `LoggerSink` - host log forwarding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{Channel, CoreConfig, NowPlayingFeed};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .native_player(Arc::new(MyExoPlayer::new()))
//!     .channel(Channel::new("red", "Red", "https://radio.example.com/listen/red/radio.mp3"))
//!     .now_playing_feed(NowPlayingFeed::new(
//!         "https://radio.example.com/api/nowplaying",
//!         "radio.example.com",
//!     ))
//!     .enable_metadata_polling(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioElementFactory, Clock, HttpClient, LifecycleObserver, LoggerSink, NativePlayer,
    NetworkMonitor, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A selectable radio channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Location of the station's now-playing JSON feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingFeed {
    /// Full feed URL
    pub url: String,
    /// Host fragment a stream URL must contain for polling to apply
    pub origin: String,
}

impl NowPlayingFeed {
    pub fn new(url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            origin: origin.into(),
        }
    }
}

/// Feature flags control optional background behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Poll the now-playing feed while a matching stream plays (requires HttpClient)
    pub enable_metadata_polling: bool,

    /// Track connectivity and reconnect on restore (requires NetworkMonitor)
    pub enable_network_awareness: bool,

    /// Verify playback after returning from background (requires LifecycleObserver)
    pub enable_lifecycle_watchdog: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_metadata_polling: false,
            enable_network_awareness: false,
            enable_lifecycle_watchdog: true,
        }
    }
}

/// Core configuration for the radio playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    pub clock: Arc<dyn Clock>,

    /// Native player primitive; preferred when present
    pub native_player: Option<Arc<dyn NativePlayer>>,

    /// Browser-style audio element factory
    pub audio_elements: Option<Arc<dyn AudioElementFactory>>,

    pub logger: Option<Arc<dyn LoggerSink>>,

    pub channels: Vec<Channel>,
    pub now_playing_feed: Option<NowPlayingFeed>,
    pub features: FeatureFlags,

    /// Capacity of the core event broadcast channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "native_player",
                &self.native_player.as_ref().map(|_| "NativePlayer { ... }"),
            )
            .field(
                "audio_elements",
                &self
                    .audio_elements
                    .as_ref()
                    .map(|_| "AudioElementFactory { ... }"),
            )
            .field("channels", &self.channels)
            .field("now_playing_feed", &self.now_playing_feed)
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Look up a configured channel by id.
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - A transport primitive is available
    /// - Channel ids are unique and non-empty, channel URLs are absolute http(s)
    /// - The now-playing feed URL is absolute
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.native_player.is_none() && self.audio_elements.is_none() {
            return Err(transport_missing_error());
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.id.trim().is_empty() {
                return Err(Error::Config("Channel id cannot be empty".to_string()));
            }
            if !seen.insert(channel.id.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate channel id '{}'",
                    channel.id
                )));
            }
            validate_http_url(&channel.url)
                .map_err(|reason| Error::Config(format!("Channel '{}': {}", channel.id, reason)))?;
        }

        if let Some(feed) = &self.now_playing_feed {
            validate_http_url(&feed.url)
                .map_err(|reason| Error::Config(format!("Now-playing feed: {}", reason)))?;
            if feed.origin.trim().is_empty() {
                return Err(Error::Config(
                    "Now-playing feed origin cannot be empty".to_string(),
                ));
            }
        }

        if self.features.enable_metadata_polling {
            if self.now_playing_feed.is_none() {
                return Err(Error::Config(
                    "Metadata polling enabled but no now-playing feed configured. \
                     Disable the feature or set .now_playing_feed()."
                        .to_string(),
                ));
            }
            if self.http_client.is_none() {
                return Err(Error::Config(
                    "Metadata polling enabled but no HttpClient provided. \
                     Disable the feature or inject an HttpClient implementation."
                        .to_string(),
                ));
            }
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_http_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme '{}'", other)),
    }
}

fn transport_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "StreamTransport".to_string(),
        message: "A playback primitive is required. \
                  Mobile: inject the platform player through .native_player(). \
                  Web: inject an AudioElementFactory through .audio_elements()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    Some(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
    Some(Arc::new(bridge_desktop::DesktopLifecycleObserver::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    clock: Option<Arc<dyn Clock>>,
    native_player: Option<Arc<dyn NativePlayer>>,
    audio_elements: Option<Arc<dyn AudioElementFactory>>,
    logger: Option<Arc<dyn LoggerSink>>,
    channels: Vec<Channel>,
    now_playing_feed: Option<NowPlayingFeed>,
    features: Option<FeatureFlags>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client used for now-playing polling.
    ///
    /// If not provided, the reqwest client is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Sets the wall clock used for metadata source priority.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the native player primitive (ExoPlayer/AVPlayer style).
    pub fn native_player(mut self, player: Arc<dyn NativePlayer>) -> Self {
        self.native_player = Some(player);
        self
    }

    /// Sets the audio element factory (browser style).
    pub fn audio_elements(mut self, factory: Arc<dyn AudioElementFactory>) -> Self {
        self.audio_elements = Some(factory);
        self
    }

    pub fn logger(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger = Some(sink);
        self
    }

    /// Appends a channel to the catalog.
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Replaces the channel catalog.
    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    pub fn now_playing_feed(mut self, feed: NowPlayingFeed) -> Self {
        self.now_playing_feed = Some(feed);
        self
    }

    /// Enables or disables now-playing feed polling.
    ///
    /// Requires an `HttpClient` and a now-playing feed.
    ///
    /// Default: false
    pub fn enable_metadata_polling(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_metadata_polling = enabled;
        self
    }

    /// Enables or disables network awareness.
    ///
    /// Requires a `NetworkMonitor` to be provided.
    ///
    /// Default: false
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_network_awareness = enabled;
        self
    }

    /// Enables or disables the foreground watchdog.
    ///
    /// Default: true (inactive without a `LifecycleObserver`)
    pub fn enable_lifecycle_watchdog(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_lifecycle_watchdog = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Default: 64
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no transport primitive was injected
    /// - [`Error::Config`] for invalid channels, feeds or inconsistent feature flags
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            http_client: self.http_client.or_else(provide_default_http_client),
            network_monitor: self.network_monitor.or_else(provide_default_network_monitor),
            lifecycle_observer: self
                .lifecycle_observer
                .or_else(provide_default_lifecycle_observer),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            native_player: self.native_player,
            audio_elements: self.audio_elements,
            logger: self.logger,
            channels: self.channels,
            now_playing_feed: self.now_playing_feed,
            features: self.features.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{AudioElement, BridgeError};

    struct NoElements;

    #[async_trait]
    impl AudioElementFactory for NoElements {
        async fn create_element(&self) -> bridge_traits::error::Result<Arc<dyn AudioElement>> {
            Err(BridgeError::NotAvailable("test".to_string()))
        }
    }

    fn web_builder() -> CoreConfigBuilder {
        CoreConfig::builder().audio_elements(Arc::new(NoElements))
    }

    #[test]
    fn test_missing_transport_is_capability_error() {
        let err = CoreConfig::builder().build().unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "StreamTransport"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_build_with_defaults() {
        let config = web_builder()
            .channel(Channel::new("red", "Red", "https://radio.example.com/red.mp3"))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.features.enable_lifecycle_watchdog);
        assert!(!config.features.enable_metadata_polling);
        assert_eq!(config.channel("red").map(|c| c.name.as_str()), Some("Red"));
        assert!(config.channel("blue").is_none());
    }

    #[test]
    fn test_duplicate_channel_ids_rejected() {
        let err = web_builder()
            .channel(Channel::new("red", "Red", "https://radio.example.com/a.mp3"))
            .channel(Channel::new("red", "Red 2", "https://radio.example.com/b.mp3"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Duplicate")));
    }

    #[test]
    fn test_channel_url_must_be_http() {
        let err = web_builder()
            .channel(Channel::new("red", "Red", "ftp://radio.example.com/a.mp3"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("scheme")));

        let err = web_builder()
            .channel(Channel::new("red", "Red", "/relative/a.mp3"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_polling_requires_feed() {
        let err = web_builder()
            .enable_metadata_polling(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("now-playing feed")));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_polling_requires_http_client() {
        let err = web_builder()
            .now_playing_feed(NowPlayingFeed::new(
                "https://radio.example.com/api/nowplaying",
                "radio.example.com",
            ))
            .enable_metadata_polling(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("HttpClient")));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_network_awareness_requires_monitor() {
        let err = web_builder()
            .enable_network_awareness(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("NetworkMonitor")));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_shims_fill_bridges() {
        let config = web_builder().enable_network_awareness(true).build().unwrap();
        assert!(config.http_client.is_some());
        assert!(config.network_monitor.is_some());
        assert!(config.lifecycle_observer.is_some());
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        let err = web_builder().event_buffer_size(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
