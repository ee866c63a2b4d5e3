//! Core service façade.
//!
//! Wires host-provided bridges (transport primitive, HTTP, network, lifecycle)
//! into the playback engine and its background monitors. A configured
//! `LoggerSink` is installed as the global tracing subscriber's host mirror
//! unless the host already installed a subscriber. Desktop apps
//! typically enable the `desktop-shims` feature, which fills missing HTTP,
//! network and lifecycle bridges with the `bridge-desktop` defaults.
//!
//! ```ignore
//! use core_playback::PlaybackConfig;
//! use core_runtime::config::{Channel, CoreConfig};
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .native_player(player)
//!     .channel(Channel::new("red", "Red", "https://radio.example.com/radio/8000/radio.mp3"))
//!     .build()?;
//! let core = CoreService::start(config, PlaybackConfig::default()).await?;
//! core.play_channel("red").await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use core_playback::metadata::{MetadataArbitrator, NowPlayingPoller};
use core_playback::{
    select_transport, HealthMonitor, LifecycleWatchdog, PlayOutcome, PlaybackConfig,
    PlaybackEngine, PlaybackError, PlaybackSnapshot, PlaybackStatus, TransportCapabilities,
};
use core_runtime::config::{Channel, CoreConfig};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::logging::{init_logging, LoggingConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    engine: Arc<PlaybackEngine>,
    events: EventBus,
    watchdog: LifecycleWatchdog,
    channels: Arc<Vec<Channel>>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CoreService {
    /// Validate configuration, select the transport and start the background
    /// monitors enabled by the feature flags.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: CoreConfig, playback: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        if let Some(sink) = &config.logger {
            if let Err(e) = init_logging(LoggingConfig::default().with_logger_sink(Arc::clone(sink))) {
                debug!(error = %e, "Host log sink not attached");
            }
        }
        playback
            .validate()
            .map_err(|reason| CoreError::Playback(PlaybackError::InvalidConfig(reason)))?;

        let transport = select_transport(TransportCapabilities {
            native_player: config.native_player.clone(),
            audio_elements: config.audio_elements.clone(),
        })?;

        let events = EventBus::new(config.event_buffer_size);
        let engine = PlaybackEngine::new(transport, playback.retry.clone(), events.clone());
        let cancel = CancellationToken::new();
        let mut tasks = vec![
            engine.spawn_transport_listener(cancel.clone()),
            HealthMonitor::new(Arc::clone(&engine), playback.health.clone(), events.clone())
                .spawn(cancel.clone()),
        ];

        let watchdog =
            LifecycleWatchdog::new(Arc::clone(&engine), playback.watchdog.clone(), events.clone());
        if config.features.enable_lifecycle_watchdog {
            match &config.lifecycle_observer {
                Some(observer) => {
                    tasks.push(watchdog.spawn_lifecycle(Arc::clone(observer), cancel.clone()))
                }
                None => debug!("No LifecycleObserver provided, foreground checks disabled"),
            }
        }
        if config.features.enable_network_awareness {
            if let Some(monitor) = &config.network_monitor {
                tasks.push(watchdog.spawn_network(Arc::clone(monitor), cancel.clone()));
            }
        }

        let arbitrator = Arc::new(MetadataArbitrator::new(
            Arc::clone(&engine),
            Arc::clone(&config.clock),
            playback.metadata.priority_window,
            events.clone(),
        ));
        tasks.push(arbitrator.spawn_push_listener(engine.transport_events(), cancel.clone()));

        if config.features.enable_metadata_polling {
            if let (Some(http), Some(feed)) = (&config.http_client, &config.now_playing_feed) {
                let poller = NowPlayingPoller::new(
                    Arc::clone(&engine),
                    Arc::clone(&arbitrator),
                    Arc::clone(http),
                    feed.clone(),
                    playback.metadata.clone(),
                );
                tasks.push(poller.spawn(cancel.clone()));
            }
        }

        if !engine.prepare().await {
            warn!("Transport setup failed, it will be retried on first play");
        }

        info!(
            transport = ?engine.transport_kind(),
            channels = config.channels.len(),
            "Core service started"
        );

        Ok(Self {
            engine,
            events,
            watchdog,
            channels: Arc::new(config.channels),
            cancel,
            tasks: Arc::new(Mutex::new(tasks)),
        })
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.engine.snapshot()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.engine.subscribe()
    }

    /// Subscribe to engine events.
    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn is_offline(&self) -> bool {
        self.watchdog.is_offline()
    }

    pub fn subscribe_offline(&self) -> watch::Receiver<bool> {
        self.watchdog.subscribe_offline()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Play an arbitrary stream URL.
    pub async fn play_stream(&self, url: &str, name: &str) -> Result<PlayOutcome> {
        if self.is_offline() {
            return Err(CoreError::Offline);
        }
        Ok(self.engine.play_stream(url, name).await)
    }

    /// Play a channel from the configured catalog.
    pub async fn play_channel(&self, id: &str) -> Result<PlayOutcome> {
        let channel = self
            .channels
            .iter()
            .find(|channel| channel.id == id)
            .ok_or_else(|| CoreError::UnknownChannel(id.to_string()))?;
        self.play_stream(&channel.url, &channel.name).await
    }

    /// Play/pause toggle. Pausing is always allowed; starting output is not
    /// while offline.
    pub async fn toggle_playback(&self) -> Result<PlaybackStatus> {
        if self.is_offline() && self.engine.status() != PlaybackStatus::Playing {
            return Err(CoreError::Offline);
        }
        Ok(self.engine.toggle_playback().await)
    }

    pub async fn stop(&self) {
        self.engine.stop().await;
    }

    pub fn clear_error(&self) {
        self.engine.clear_error();
    }

    /// Cancel background tasks, stop playback and release the transport.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "Background task ended abnormally");
            }
        }
        self.engine.shutdown().await;
        info!("Core service shut down");
    }
}
