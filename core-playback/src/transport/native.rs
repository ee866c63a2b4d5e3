//! Transport over a host native player.

use super::setup::SetupGuard;
use super::{StreamTransport, TransportEvent, TransportKind, TRANSPORT_EVENT_CAPACITY};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::media::{LiveSource, NativePlayer, PlayerEvent, PlayerEventStream, PlayerState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// [`StreamTransport`] backed by a [`NativePlayer`].
pub struct NativeTransport {
    inner: Arc<NativeInner>,
}

struct NativeInner {
    player: Arc<dyn NativePlayer>,
    setup: SetupGuard,
    /// Bumped by `destroy()` so an in-flight setup discards its listener.
    lifecycle: AtomicU64,
    /// Latest `play()` request id.
    request_id: AtomicU64,
    /// Request id that last started output on the player.
    player_owner: AtomicU64,
    listener: Mutex<Option<CancellationToken>>,
    current: Mutex<Option<LiveSource>>,
    events: broadcast::Sender<TransportEvent>,
}

impl NativeInner {
    fn ensure_current(&self, request: u64) -> Result<()> {
        if self.request_id.load(Ordering::SeqCst) == request {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }
}

impl NativeTransport {
    pub fn new(player: Arc<dyn NativePlayer>) -> Self {
        let (events, _) = broadcast::channel(TRANSPORT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(NativeInner {
                player,
                setup: SetupGuard::new(),
                lifecycle: AtomicU64::new(0),
                request_id: AtomicU64::new(0),
                player_owner: AtomicU64::new(0),
                listener: Mutex::new(None),
                current: Mutex::new(None),
                events,
            }),
        }
    }

    async fn initialize(inner: Arc<NativeInner>, lifecycle: u64) -> bool {
        if let Err(e) = inner.player.initialize().await {
            warn!(error = %e, "Native player initialization failed");
            return false;
        }

        let stream = match inner.player.subscribe_events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to subscribe to native player events");
                return false;
            }
        };

        let accepted = {
            let mut listener = inner.listener.lock();
            if inner.lifecycle.load(Ordering::SeqCst) != lifecycle {
                false
            } else {
                let cancel = CancellationToken::new();
                tokio::spawn(forward_player_events(
                    stream,
                    inner.events.clone(),
                    cancel.clone(),
                ));
                if let Some(previous) = listener.replace(cancel) {
                    previous.cancel();
                }
                true
            }
        };

        if !accepted {
            debug!("Transport destroyed during setup, releasing player");
            if let Err(e) = inner.player.release().await {
                debug!(error = %e, "Releasing player after cancelled setup failed");
            }
            return false;
        }

        debug!("Native transport ready");
        true
    }
}

async fn forward_player_events(
    mut stream: Box<dyn PlayerEventStream>,
    events: broadcast::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };

        let Some(event) = event else {
            debug!("Native player event stream closed");
            break;
        };

        let forwarded = match event {
            PlayerEvent::StateChanged(state) => TransportEvent::StateChanged(state),
            PlayerEvent::Error(failure) => TransportEvent::Error(failure),
            PlayerEvent::Metadata(metadata) => TransportEvent::Metadata(metadata),
        };
        // No subscribers is fine.
        let _ = events.send(forwarded);
    }
}

#[async_trait]
impl StreamTransport for NativeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }

    async fn setup(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        let lifecycle = inner.lifecycle.load(Ordering::SeqCst);
        self.inner
            .setup
            .run(move || Self::initialize(inner, lifecycle))
            .await
    }

    #[instrument(skip(self, url))]
    async fn play(&self, url: &str, title: &str) -> Result<()> {
        let inner = &self.inner;
        let request = inner.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let source = LiveSource::live(url, title);
        *inner.current.lock() = Some(source.clone());

        if !self.setup().await {
            return Err(PlaybackError::SetupFailed(
                "native player could not be initialized".to_string(),
            ));
        }
        inner.ensure_current(request)?;

        if let Err(e) = inner.player.pause().await {
            debug!(error = %e, "Pausing previous output failed");
        }
        inner.ensure_current(request)?;

        inner.player.reset().await?;
        inner.ensure_current(request)?;

        inner.player.load(source).await?;
        inner.ensure_current(request)?;

        inner.player_owner.store(request, Ordering::SeqCst);
        inner.player.play().await?;

        if inner.ensure_current(request).is_err() {
            // Output started for a stale request; silence it unless a newer one took over.
            if inner.player_owner.load(Ordering::SeqCst) == request {
                if let Err(e) = inner.player.pause().await {
                    debug!(error = %e, "Pausing stale output failed");
                }
            }
            return Err(PlaybackError::Superseded);
        }

        debug!(request, "Native output started");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.inner.player.pause().await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.inner.request_id.fetch_add(1, Ordering::SeqCst);
        if !self.inner.setup.is_ready() {
            return Ok(());
        }
        self.inner.player.stop().await?;
        Ok(())
    }

    async fn toggle_playback(&self) -> Result<bool> {
        if !self.inner.setup.is_ready() {
            return Err(PlaybackError::NoStreamLoaded);
        }

        if matches!(
            self.inner.player.state().await?,
            PlayerState::Playing | PlayerState::Buffering
        ) {
            self.inner.player.pause().await?;
            Ok(false)
        } else {
            self.reconnect_stream().await?;
            Ok(true)
        }
    }

    async fn destroy(&self) -> Result<()> {
        let inner = &self.inner;
        inner.lifecycle.fetch_add(1, Ordering::SeqCst);
        inner.request_id.fetch_add(1, Ordering::SeqCst);

        if let Some(listener) = inner.listener.lock().take() {
            listener.cancel();
        }
        let was_ready = inner.setup.is_ready();
        inner.setup.reset();
        inner.current.lock().take();

        if was_ready {
            if let Err(e) = inner.player.release().await {
                warn!(error = %e, "Releasing native player failed");
            }
        }
        debug!("Native transport destroyed");
        Ok(())
    }

    async fn verify_playback(&self) -> bool {
        if !self.inner.setup.is_ready() {
            return false;
        }
        matches!(self.inner.player.state().await, Ok(PlayerState::Playing))
    }

    async fn reconnect_stream(&self) -> Result<()> {
        let source = self
            .inner
            .current
            .lock()
            .clone()
            .ok_or(PlaybackError::NoStreamLoaded)?;
        debug!("Reloading live edge");
        self.play(&source.url, &source.title).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }
}
