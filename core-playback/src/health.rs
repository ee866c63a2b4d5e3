//! # Health-Check Monitor
//!
//! While the engine reports `playing`, periodically asks the transport whether
//! audio is really flowing. Consecutive failures past a threshold trigger a
//! reconnect through the engine's normal retry path.

use crate::config::HealthCheckConfig;
use crate::engine::{PlaybackEngine, ReconnectReason};
use crate::state::{PlaybackSnapshot, PlaybackStatus};
use crate::transport::TransportKind;
use core_runtime::events::{CoreEvent, EventBus, HealthEvent};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure counter for one playing episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthState {
    pub consecutive_failures: u32,
}

/// What a single check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckVerdict {
    Healthy,
    /// Healthy again after `previous_failures` failed checks.
    Recovered { previous_failures: u32 },
    Failed { consecutive_failures: u32 },
    /// Threshold hit; the counter has been reset.
    Escalate { consecutive_failures: u32 },
}

impl HealthState {
    pub fn record(&mut self, verified: bool, threshold: u32) -> CheckVerdict {
        if verified {
            let previous_failures = std::mem::take(&mut self.consecutive_failures);
            return if previous_failures > 0 {
                CheckVerdict::Recovered { previous_failures }
            } else {
                CheckVerdict::Healthy
            };
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            let consecutive_failures = std::mem::take(&mut self.consecutive_failures);
            CheckVerdict::Escalate { consecutive_failures }
        } else {
            CheckVerdict::Failed {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }
}

/// Periodic playback verifier.
pub struct HealthMonitor {
    engine: Arc<PlaybackEngine>,
    config: HealthCheckConfig,
    threshold: u32,
    events: EventBus,
}

impl HealthMonitor {
    pub fn new(engine: Arc<PlaybackEngine>, config: HealthCheckConfig, events: EventBus) -> Self {
        let threshold = match engine.transport_kind() {
            TransportKind::Native => config.native_failure_threshold,
            TransportKind::Web => config.web_failure_threshold,
        };
        Self {
            engine,
            config,
            threshold,
            events,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Run until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut snapshots = self.engine.subscribe();
        loop {
            let playing = snapshots.borrow_and_update().status == PlaybackStatus::Playing;
            if playing {
                if !self.watch_episode(&mut snapshots, &cancel).await {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Health monitor stopped");
    }

    /// Check periodically until playback leaves `playing` or re-enters it
    /// through a reconnect. Returns `false` when the monitor should exit.
    async fn watch_episode(
        &self,
        snapshots: &mut watch::Receiver<PlaybackSnapshot>,
        cancel: &CancellationToken,
    ) -> bool {
        let episode = snapshots.borrow().playing_episode;
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health = HealthState::default();
        debug!(period_ms = period.as_millis() as u64, "Health checks started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    let (status, current_episode) = {
                        let snapshot = snapshots.borrow_and_update();
                        (snapshot.status, snapshot.playing_episode)
                    };
                    if status != PlaybackStatus::Playing {
                        debug!("Health checks stopped, playback left playing state");
                        return true;
                    }
                    if current_episode != episode {
                        debug!("Playback restarted, health checks restart");
                        return true;
                    }
                }
                _ = ticker.tick() => self.check(&mut health).await,
            }
        }
    }

    async fn check(&self, health: &mut HealthState) {
        let verified = self.engine.verify_playback().await;

        let snapshot = self.engine.snapshot();
        if snapshot.status != PlaybackStatus::Playing {
            return;
        }
        let stream_url = snapshot.current_stream_url.unwrap_or_default();

        match health.record(verified, self.threshold) {
            CheckVerdict::Healthy => {}
            CheckVerdict::Recovered { previous_failures } => {
                info!(previous_failures, "Playback verification recovered");
                self.emit(HealthEvent::Recovered { stream_url });
            }
            CheckVerdict::Failed {
                consecutive_failures,
            } => {
                warn!(consecutive_failures, threshold = self.threshold, "Playback verification failed");
                self.emit(HealthEvent::CheckFailed {
                    stream_url,
                    consecutive_failures,
                });
            }
            CheckVerdict::Escalate {
                consecutive_failures,
            } => {
                warn!(consecutive_failures, "Playback verification threshold reached, reconnecting");
                self.emit(HealthEvent::ThresholdReached {
                    stream_url,
                    consecutive_failures,
                });
                let engine = Arc::clone(&self.engine);
                tokio::spawn(async move {
                    engine.reconnect(ReconnectReason::HealthCheck).await;
                });
            }
        }
    }

    fn emit(&self, event: HealthEvent) {
        let _ = self.events.emit(CoreEvent::Health(event));
    }
}
