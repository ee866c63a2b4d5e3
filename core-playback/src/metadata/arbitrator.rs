//! Push/poll priority between metadata sources.

use super::parse_in_band;
use crate::engine::PlaybackEngine;
use crate::state::StreamMetadata;
use crate::transport::TransportEvent;
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, MetadataEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What happened to an incoming metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    Applied,
    /// A push for the same stream is still inside its priority window.
    Dropped { remaining: Duration },
    /// The value was for a stream that is no longer selected.
    NotCurrent,
}

/// Decides whether pushed or polled metadata reaches the snapshot.
pub struct MetadataArbitrator {
    engine: Arc<PlaybackEngine>,
    clock: Arc<dyn Clock>,
    priority_window: Duration,
    /// Last push time (unix millis) per stream URL.
    last_push: Mutex<HashMap<String, i64>>,
    events: EventBus,
}

impl MetadataArbitrator {
    pub fn new(
        engine: Arc<PlaybackEngine>,
        clock: Arc<dyn Clock>,
        priority_window: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            engine,
            clock,
            priority_window,
            last_push: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Apply pushed metadata and open its priority window.
    pub fn on_push(&self, stream_url: &str, metadata: StreamMetadata) -> Arbitration {
        if !self.engine.apply_metadata(stream_url, metadata.clone()) {
            return Arbitration::NotCurrent;
        }
        self.last_push
            .lock()
            .insert(stream_url.to_string(), self.clock.unix_timestamp_millis());
        self.emit_updated(stream_url, metadata, "push");
        Arbitration::Applied
    }

    /// Apply polled metadata unless a recent push owns the stream.
    pub fn on_poll(&self, stream_url: &str, metadata: StreamMetadata) -> Arbitration {
        if let Some(remaining) = self.push_window_remaining(stream_url) {
            debug!(remaining_ms = remaining.as_millis() as u64, "Polled metadata dropped");
            let _ = self.events.emit(CoreEvent::Metadata(MetadataEvent::PollDropped {
                stream_url: stream_url.to_string(),
                remaining_ms: remaining.as_millis() as u64,
            }));
            return Arbitration::Dropped { remaining };
        }

        if !self.engine.apply_metadata(stream_url, metadata.clone()) {
            return Arbitration::NotCurrent;
        }
        self.emit_updated(stream_url, metadata, "poll");
        Arbitration::Applied
    }

    fn push_window_remaining(&self, stream_url: &str) -> Option<Duration> {
        let pushed_at = *self.last_push.lock().get(stream_url)?;
        let elapsed_ms = self.clock.unix_timestamp_millis().saturating_sub(pushed_at).max(0) as u64;
        let window_ms = self.priority_window.as_millis() as u64;
        (elapsed_ms < window_ms).then(|| Duration::from_millis(window_ms - elapsed_ms))
    }

    fn emit_updated(&self, stream_url: &str, metadata: StreamMetadata, source: &str) {
        let _ = self.events.emit(CoreEvent::Metadata(MetadataEvent::Updated {
            stream_url: stream_url.to_string(),
            title: metadata.title,
            artist: metadata.artist,
            source: source.to_string(),
        }));
    }

    /// Feed in-band transport metadata through [`Self::on_push`] until `cancel` fires.
    pub fn spawn_push_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let arbitrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(TransportEvent::Metadata(in_band)) => {
                        let Some(url) = arbitrator.engine.snapshot().current_stream_url else {
                            continue;
                        };
                        if let Some(metadata) = parse_in_band(&in_band) {
                            arbitrator.on_push(&url, metadata);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Metadata listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Metadata push listener stopped");
        })
    }
}
