//! # Playback State Machine
//!
//! [`PlaybackEngine`] is the single owner of playback state. Every collaborator
//! (health monitor, lifecycle watchdog, metadata arbitrator, UI façade) reads the
//! published [`PlaybackSnapshot`] and acts through the engine's intents.
//!
//! ## States
//!
//! ```text
//!   idle ──play──▶ loading ──ok──▶ playing ◀──toggle──▶ paused
//!                     │  ▲
//!               fail  │  │ retry / reconnect
//!                     ▼  │
//!                    error
//!
//!   any ──stop──▶ idle
//! ```
//!
//! ## Fencing
//!
//! Each play intent advances a [`RequestFence`] and re-checks its token after
//! every await (transport I/O, backoff sleep). A superseded intent returns
//! [`PlayOutcome::Superseded`] without touching state.

use crate::backoff;
use crate::config::RetryPolicy;
use crate::error::{CategorizedError, PlaybackError};
use crate::fence::{FenceToken, RequestFence};
use crate::state::{PlaybackSnapshot, PlaybackStatus, StreamMetadata, StreamSelection};
use crate::transport::{StreamTransport, TransportEvent, TransportKind};
use bridge_traits::media::PlayerState;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_stream_url;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Outcomes
// ============================================================================

/// Why an automatic reconnect was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectReason {
    /// Health checks failed past the threshold.
    HealthCheck,
    /// Output was silent after returning to foreground.
    Foreground,
    /// Connectivity came back.
    NetworkRestored,
    /// The transport reported a retryable error mid-stream.
    TransportError,
}

impl ReconnectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconnectReason::HealthCheck => "health_check",
            ReconnectReason::Foreground => "foreground",
            ReconnectReason::NetworkRestored => "network_restored",
            ReconnectReason::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a play or reconnect intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// The same stream was already playing or loading.
    AlreadyActive,
    /// A newer intent took over; nothing was changed by this one.
    Superseded,
    /// Nothing is selected to reconnect to.
    NoSelection,
    /// Terminal failure stored in the snapshot.
    Failed(CategorizedError),
}

// ============================================================================
// Engine
// ============================================================================

/// Playback state machine.
pub struct PlaybackEngine {
    transport: Arc<dyn StreamTransport>,
    policy: RetryPolicy,
    fence: RequestFence,
    state: watch::Sender<PlaybackSnapshot>,
    events: EventBus,
}

impl PlaybackEngine {
    pub fn new(transport: Arc<dyn StreamTransport>, policy: RetryPolicy, events: EventBus) -> Arc<Self> {
        let (state, _) = watch::channel(PlaybackSnapshot::default());
        Arc::new(Self {
            transport,
            policy,
            fence: RequestFence::new(),
            state,
            events,
        })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.borrow().status
    }

    pub fn selection(&self) -> Option<StreamSelection> {
        self.state.borrow().selection()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Subscribe to raw transport events (metadata consumers use this).
    pub fn transport_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.transport.subscribe()
    }

    /// Start playing `url`. No-op when it is already playing or loading.
    #[instrument(skip(self, url), fields(url = %redact_stream_url(url)))]
    pub async fn play_stream(&self, url: &str, name: &str) -> PlayOutcome {
        if self.state.borrow().is_active_on(url) {
            debug!("Stream already active, ignoring play intent");
            return PlayOutcome::AlreadyActive;
        }
        self.run_intent(url, name).await
    }

    /// Re-enter the play path for the current selection, skipping the
    /// already-active check.
    #[instrument(skip(self))]
    pub async fn reconnect(&self, reason: ReconnectReason) -> PlayOutcome {
        let Some(selection) = self.selection() else {
            debug!("Reconnect requested with nothing selected");
            return PlayOutcome::NoSelection;
        };

        info!(url = %redact_stream_url(&selection.url), "Reconnecting stream");
        self.emit(PlaybackEvent::Reconnecting {
            stream_url: selection.url.clone(),
            reason: reason.as_str().to_string(),
        });
        self.run_intent(&selection.url, &selection.display_name).await
    }

    async fn run_intent(&self, url: &str, name: &str) -> PlayOutcome {
        let token = self.fence.advance();

        self.state.send_modify(|s| {
            if s.current_stream_url.as_deref() != Some(url) {
                s.stream_metadata = StreamMetadata::default();
            }
            s.status = PlaybackStatus::Loading;
            s.current_stream_url = Some(url.to_string());
            s.current_stream_name = Some(name.to_string());
            s.error = None;
            s.retry_count = 0;
            s.is_retrying = false;
        });
        self.emit(PlaybackEvent::Loading {
            stream_url: url.to_string(),
            stream_name: name.to_string(),
        });

        let mut attempt: u32 = 0;
        loop {
            if !self.fence.is_current(token) {
                return PlayOutcome::Superseded;
            }

            let result = self.transport.play(url, name).await;
            if !self.fence.is_current(token) {
                debug!(generation = token.generation(), "Play intent superseded");
                return PlayOutcome::Superseded;
            }

            let err = match result {
                Ok(()) => {
                    self.state.send_modify(|s| {
                        s.status = PlaybackStatus::Playing;
                        s.playing_episode += 1;
                        s.retry_count = 0;
                        s.is_retrying = false;
                    });
                    info!(attempts = attempt + 1, "Playback started");
                    self.emit(PlaybackEvent::Started {
                        stream_url: url.to_string(),
                        stream_name: name.to_string(),
                    });
                    return PlayOutcome::Started;
                }
                Err(err) => err,
            };

            let categorized = CategorizedError::from(&err);
            if !categorized.retryable || attempt >= self.policy.max_retries {
                return self.fail(token, url, categorized.with_network_hint(), attempt);
            }

            attempt += 1;
            let delay = backoff::retry_delay(&self.policy, attempt);
            warn!(
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                category = %categorized.category,
                error = %err,
                "Play attempt failed, retrying"
            );
            self.state.send_modify(|s| {
                s.retry_count = attempt;
                s.is_retrying = true;
            });
            self.emit(PlaybackEvent::Retrying {
                stream_url: url.to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::time::sleep(delay).await;
        }
    }

    fn fail(&self, token: FenceToken, url: &str, error: CategorizedError, attempt: u32) -> PlayOutcome {
        if !self.fence.is_current(token) {
            return PlayOutcome::Superseded;
        }
        warn!(category = %error.category, attempts = attempt + 1, "Playback failed: {}", error.message);

        let stored = error.clone();
        self.state.send_modify(|s| {
            s.status = PlaybackStatus::Error;
            s.error = Some(stored);
            s.retry_count = attempt;
            s.is_retrying = false;
        });
        self.emit(PlaybackEvent::Error {
            stream_url: Some(url.to_string()),
            message: error.message.clone(),
            category: error.category.to_string(),
            recoverable: error.retryable,
        });
        PlayOutcome::Failed(error)
    }

    /// Play/pause toggle.
    ///
    /// From `idle`/`error` this re-enters the play path for the remembered
    /// selection; live streams are never resumed from a stale buffer.
    #[instrument(skip(self))]
    pub async fn toggle_playback(&self) -> PlaybackStatus {
        let snapshot = self.snapshot();
        match snapshot.status {
            PlaybackStatus::Idle | PlaybackStatus::Error => {
                if let Some(selection) = snapshot.selection() {
                    self.run_intent(&selection.url, &selection.display_name).await;
                } else {
                    debug!("Toggle with nothing selected");
                }
            }
            PlaybackStatus::Loading => {
                debug!("Toggle ignored while loading");
            }
            PlaybackStatus::Playing | PlaybackStatus::Paused => {
                let token = self.fence.current();
                let result = self.transport.toggle_playback().await;
                if !self.fence.is_current(token) {
                    return self.status();
                }
                let url = snapshot.current_stream_url.clone().unwrap_or_default();
                match result {
                    Ok(true) => {
                        self.state.send_modify(|s| {
                            s.status = PlaybackStatus::Playing;
                            s.playing_episode += 1;
                            s.error = None;
                        });
                        self.emit(PlaybackEvent::Resumed { stream_url: url });
                    }
                    Ok(false) => {
                        self.state.send_modify(|s| s.status = PlaybackStatus::Paused);
                        self.emit(PlaybackEvent::Paused { stream_url: url });
                    }
                    Err(err) => {
                        let categorized = CategorizedError::from(&err).with_network_hint();
                        self.fail(token, &url, categorized, 0);
                    }
                }
            }
        }
        self.status()
    }

    /// Reset to `idle` and stop the transport. Never fails.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.fence.advance();
        self.state.send_modify(|s| {
            *s = PlaybackSnapshot {
                playing_episode: s.playing_episode,
                ..PlaybackSnapshot::default()
            }
        });
        self.emit(PlaybackEvent::Stopped);

        if let Err(e) = self.transport.stop().await {
            warn!(error = %e, "Transport stop failed");
        }
        info!("Playback stopped");
    }

    /// Dismiss the stored error. An `error` status becomes `idle` with the
    /// selection kept so a toggle can retry.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| {
            if s.error.is_none() && s.status != PlaybackStatus::Error {
                return false;
            }
            s.error = None;
            s.retry_count = 0;
            s.is_retrying = false;
            if s.status == PlaybackStatus::Error {
                s.status = PlaybackStatus::Idle;
            }
            true
        });
    }

    /// Store now-playing metadata for `stream_url`. Ignored unless it is the
    /// current selection.
    pub fn apply_metadata(&self, stream_url: &str, metadata: StreamMetadata) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|s| {
            if s.current_stream_url.as_deref() != Some(stream_url) {
                return false;
            }
            applied = true;
            if s.stream_metadata == metadata {
                return false;
            }
            s.stream_metadata = metadata;
            true
        });
        applied
    }

    /// Ask the transport whether audio is actually flowing.
    pub async fn verify_playback(&self) -> bool {
        self.transport.verify_playback().await
    }

    /// Initialize the transport ahead of the first play.
    pub async fn prepare(&self) -> bool {
        self.transport.setup().await
    }

    /// Stop and release the transport.
    pub async fn shutdown(&self) {
        self.stop().await;
        if let Err(e) = self.transport.destroy().await {
            warn!(error = %e, "Transport destroy failed");
        }
    }

    /// Mirror transport-side changes (interruptions, mid-stream errors) into
    /// the state machine until `cancel` fires.
    pub fn spawn_transport_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut events = self.transport.subscribe();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(event) => engine.handle_transport_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Transport listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Transport listener stopped");
        })
    }

    async fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        let snapshot = self.snapshot();
        let url = snapshot.current_stream_url.clone().unwrap_or_default();

        match (event, snapshot.status) {
            (TransportEvent::StateChanged(PlayerState::Paused), PlaybackStatus::Playing) => {
                // Pause events from our own source switch can arrive late.
                if self.transport.verify_playback().await {
                    return;
                }
                let changed = self.state.send_if_modified(|s| {
                    if s.status == PlaybackStatus::Playing {
                        s.status = PlaybackStatus::Paused;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    info!("Playback interrupted by host");
                    self.emit(PlaybackEvent::Paused { stream_url: url });
                }
            }
            (TransportEvent::StateChanged(PlayerState::Playing), PlaybackStatus::Paused) => {
                let changed = self.state.send_if_modified(|s| {
                    if s.status == PlaybackStatus::Paused {
                        s.status = PlaybackStatus::Playing;
                        s.playing_episode += 1;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    info!("Playback resumed by host");
                    self.emit(PlaybackEvent::Resumed { stream_url: url });
                }
            }
            (TransportEvent::Error(failure), PlaybackStatus::Playing) => {
                let err = PlaybackError::from(bridge_traits::BridgeError::from(failure));
                let categorized = CategorizedError::from(&err);
                if categorized.retryable {
                    warn!(category = %categorized.category, "Transport error while playing, reconnecting");
                    let engine = Arc::clone(self);
                    tokio::spawn(async move {
                        engine.reconnect(ReconnectReason::TransportError).await;
                    });
                } else {
                    self.fail(self.fence.current(), &url, categorized, 0);
                }
            }
            _ => {}
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.emit(CoreEvent::Playback(event));
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("transport", &self.transport.kind())
            .field("status", &self.status())
            .finish()
    }
}
