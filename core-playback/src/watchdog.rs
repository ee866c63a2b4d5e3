//! # Lifecycle Watchdog
//!
//! Reacts to two host signals:
//!
//! - **Foreground/background**: after a long enough background stay during
//!   playback, waits for the app to settle and verifies output. Silent output
//!   triggers a reconnect.
//! - **Connectivity**: tracks the offline flag and schedules a debounced
//!   reconnect when the network comes back.
//!
//! Both reconnect through [`PlaybackEngine::reconnect`], so backoff and
//! classification are the same as for user-initiated plays.

use crate::config::WatchdogConfig;
use crate::engine::{PlaybackEngine, ReconnectReason};
use crate::state::PlaybackStatus;
use bridge_traits::lifecycle::{LifecycleObserver, LifecycleState};
use bridge_traits::network::NetworkMonitor;
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// When the app went to background and whether it was playing then.
#[derive(Debug, Clone, Copy)]
struct BackgroundMark {
    since: Instant,
    was_playing: bool,
}

/// Host lifecycle and connectivity watcher.
#[derive(Clone)]
pub struct LifecycleWatchdog {
    engine: Arc<PlaybackEngine>,
    config: WatchdogConfig,
    events: EventBus,
    offline: Arc<watch::Sender<bool>>,
}

impl LifecycleWatchdog {
    pub fn new(engine: Arc<PlaybackEngine>, config: WatchdogConfig, events: EventBus) -> Self {
        let (offline, _) = watch::channel(false);
        Self {
            engine,
            config,
            events,
            offline: Arc::new(offline),
        }
    }

    /// Current offline flag.
    pub fn is_offline(&self) -> bool {
        *self.offline.borrow()
    }

    /// Receiver for the offline flag.
    pub fn subscribe_offline(&self) -> watch::Receiver<bool> {
        self.offline.subscribe()
    }

    // ========================================================================
    // Foreground / background
    // ========================================================================

    /// Watch lifecycle transitions until `cancel` fires.
    pub fn spawn_lifecycle(
        &self,
        observer: Arc<dyn LifecycleObserver>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let watchdog = self.clone();
        tokio::spawn(async move { watchdog.run_lifecycle(observer, cancel).await })
    }

    async fn run_lifecycle(self, observer: Arc<dyn LifecycleObserver>, cancel: CancellationToken) {
        let mut changes = match observer.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Lifecycle subscription failed, watchdog disabled");
                return;
            }
        };

        let mut background: Option<BackgroundMark> = None;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = changes.next() => next,
            };
            let Some(state) = next else {
                debug!("Lifecycle stream closed");
                break;
            };

            match state {
                LifecycleState::Background => {
                    if background.is_none() {
                        let was_playing = self.engine.status() == PlaybackStatus::Playing;
                        debug!(was_playing, "App moved to background");
                        background = Some(BackgroundMark {
                            since: Instant::now(),
                            was_playing,
                        });
                    }
                }
                LifecycleState::Active => {
                    let Some(mark) = background.take() else {
                        continue;
                    };
                    let away = mark.since.elapsed();
                    debug!(away_ms = away.as_millis() as u64, "App returned to foreground");
                    if mark.was_playing && away >= self.config.min_background {
                        if !self.verify_after_foreground(&cancel).await {
                            break;
                        }
                    }
                }
                LifecycleState::Inactive => {}
            }
        }
        debug!("Lifecycle watchdog stopped");
    }

    /// Returns `false` if cancelled while settling.
    async fn verify_after_foreground(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(self.config.foreground_settle) => {}
        }

        if self.engine.status() != PlaybackStatus::Playing {
            return true;
        }
        if self.engine.verify_playback().await {
            debug!("Playback verified after foreground");
            return true;
        }
        if self.engine.status() != PlaybackStatus::Playing {
            return true;
        }

        info!("Output silent after foreground, reconnecting");
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.reconnect(ReconnectReason::Foreground).await;
        });
        true
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    /// Track connectivity until `cancel` fires.
    pub fn spawn_network(
        &self,
        monitor: Arc<dyn NetworkMonitor>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let watchdog = self.clone();
        tokio::spawn(async move { watchdog.run_network(monitor, cancel).await })
    }

    fn should_reconnect(&self) -> bool {
        let snapshot = self.engine.snapshot();
        snapshot.current_stream_url.is_some()
            && matches!(
                snapshot.status,
                PlaybackStatus::Playing | PlaybackStatus::Loading | PlaybackStatus::Error
            )
    }

    fn set_offline(&self, offline: bool) {
        let changed = self.offline.send_if_modified(|current| {
            if *current == offline {
                false
            } else {
                *current = offline;
                true
            }
        });
        if changed {
            let event = if offline {
                warn!("Network connection lost");
                ConnectivityEvent::Offline
            } else {
                info!("Network connection restored");
                ConnectivityEvent::Online
            };
            let _ = self.events.emit(CoreEvent::Connectivity(event));
        }
    }

    async fn run_network(self, monitor: Arc<dyn NetworkMonitor>, cancel: CancellationToken) {
        let mut connected = monitor.is_connected().await;
        self.set_offline(!connected);

        let mut changes = match monitor.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Network subscription failed, connectivity tracking disabled");
                return;
            }
        };

        let debounce_period = self.config.reconnect_debounce;
        let debounce = tokio::time::sleep(debounce_period);
        tokio::pin!(debounce);
        let mut armed = false;
        let mut reconnect_task: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                () = &mut debounce, if armed => {
                    armed = false;
                    if self.should_reconnect() {
                        info!("Reconnecting after network restore");
                        let engine = Arc::clone(&self.engine);
                        reconnect_task = Some(tokio::spawn(async move {
                            engine.reconnect(ReconnectReason::NetworkRestored).await;
                        }));
                    } else {
                        debug!("Network restored with nothing to reconnect");
                    }
                }
                next = changes.next() => {
                    let Some(info) = next else {
                        debug!("Network change stream closed");
                        break;
                    };
                    let Some(now_connected) = info.is_connected() else {
                        debug!("Indeterminate network status ignored");
                        continue;
                    };

                    let was_connected = std::mem::replace(&mut connected, now_connected);
                    self.set_offline(!now_connected);

                    if !now_connected {
                        if armed {
                            debug!("Network lost again, pending reconnect cancelled");
                            armed = false;
                        }
                        continue;
                    }

                    if armed || (!was_connected && self.should_reconnect()) {
                        debounce.as_mut().reset(Instant::now() + debounce_period);
                        armed = true;
                        let _ = self.events.emit(CoreEvent::Connectivity(
                            ConnectivityEvent::ReconnectScheduled {
                                delay_ms: debounce_period.as_millis() as u64,
                            },
                        ));
                    }
                }
            }
        }

        if let Some(task) = reconnect_task {
            task.abort();
        }
        debug!("Network watchdog stopped");
    }
}
