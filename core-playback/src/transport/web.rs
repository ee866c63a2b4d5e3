//! Transport over a browser-style audio element.

use super::setup::SetupGuard;
use super::{StreamTransport, TransportEvent, TransportKind, TRANSPORT_EVENT_CAPACITY};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::media::{AudioElement, AudioElementFactory, ElementEvent, ElementEventStream, PlayerState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// [`StreamTransport`] backed by an [`AudioElement`].
///
/// The element is created lazily by `setup()`. Playing state is tracked from
/// element events because `paused == false` alone does not mean audio is flowing
/// (the element may be waiting on the network).
pub struct WebTransport {
    inner: Arc<WebInner>,
}

struct WebInner {
    factory: Arc<dyn AudioElementFactory>,
    element: Mutex<Option<Arc<dyn AudioElement>>>,
    setup: SetupGuard,
    lifecycle: AtomicU64,
    request_id: AtomicU64,
    player_owner: AtomicU64,
    /// Set on `playing`, cleared on pause/waiting/stalled/ended/emptied/error.
    playing: Arc<AtomicBool>,
    listener: Mutex<Option<CancellationToken>>,
    current: Mutex<Option<(String, String)>>,
    events: broadcast::Sender<TransportEvent>,
}

impl WebInner {
    fn ensure_current(&self, request: u64) -> Result<()> {
        if self.request_id.load(Ordering::SeqCst) == request {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }

    fn element(&self) -> Option<Arc<dyn AudioElement>> {
        self.element.lock().clone()
    }
}

impl WebTransport {
    pub fn new(factory: Arc<dyn AudioElementFactory>) -> Self {
        let (events, _) = broadcast::channel(TRANSPORT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(WebInner {
                factory,
                element: Mutex::new(None),
                setup: SetupGuard::new(),
                lifecycle: AtomicU64::new(0),
                request_id: AtomicU64::new(0),
                player_owner: AtomicU64::new(0),
                playing: Arc::new(AtomicBool::new(false)),
                listener: Mutex::new(None),
                current: Mutex::new(None),
                events,
            }),
        }
    }

    async fn initialize(inner: Arc<WebInner>, lifecycle: u64) -> bool {
        let element = match inner.factory.create_element().await {
            Ok(element) => element,
            Err(e) => {
                warn!(error = %e, "Audio element creation failed");
                return false;
            }
        };

        let stream = match element.subscribe_events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to subscribe to audio element events");
                return false;
            }
        };

        let mut listener = inner.listener.lock();
        if inner.lifecycle.load(Ordering::SeqCst) != lifecycle {
            debug!("Transport destroyed during setup, dropping element");
            return false;
        }

        let cancel = CancellationToken::new();
        tokio::spawn(forward_element_events(
            stream,
            inner.events.clone(),
            Arc::clone(&inner.playing),
            cancel.clone(),
        ));
        if let Some(previous) = listener.replace(cancel) {
            previous.cancel();
        }
        *inner.element.lock() = Some(element);
        debug!("Web transport ready");
        true
    }
}

async fn forward_element_events(
    mut stream: Box<dyn ElementEventStream>,
    events: broadcast::Sender<TransportEvent>,
    playing: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };

        let Some(event) = event else {
            debug!("Audio element event stream closed");
            break;
        };

        let forwarded = match event {
            ElementEvent::Playing => {
                playing.store(true, Ordering::SeqCst);
                TransportEvent::StateChanged(PlayerState::Playing)
            }
            ElementEvent::Pause => {
                playing.store(false, Ordering::SeqCst);
                TransportEvent::StateChanged(PlayerState::Paused)
            }
            ElementEvent::Waiting | ElementEvent::Stalled => {
                playing.store(false, Ordering::SeqCst);
                TransportEvent::StateChanged(PlayerState::Buffering)
            }
            ElementEvent::Ended => {
                playing.store(false, Ordering::SeqCst);
                TransportEvent::StateChanged(PlayerState::Ended)
            }
            ElementEvent::Emptied => {
                playing.store(false, Ordering::SeqCst);
                TransportEvent::StateChanged(PlayerState::None)
            }
            ElementEvent::Error(failure) => {
                playing.store(false, Ordering::SeqCst);
                TransportEvent::Error(failure)
            }
        };
        let _ = events.send(forwarded);
    }
}

#[async_trait]
impl StreamTransport for WebTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Web
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
        *inner.current.lock() = Some((url.to_string(), title.to_string()));

        if !self.setup().await {
            return Err(PlaybackError::SetupFailed(
                "audio element could not be created".to_string(),
            ));
        }
        inner.ensure_current(request)?;
        let element = inner.element().ok_or(PlaybackError::TransportDestroyed)?;

        if let Err(e) = element.pause().await {
            debug!(error = %e, "Pausing previous output failed");
        }
        inner.ensure_current(request)?;

        element.clear_source().await?;
        inner.ensure_current(request)?;

        element.set_source(url).await?;
        element.load().await?;
        inner.ensure_current(request)?;

        inner.player_owner.store(request, Ordering::SeqCst);
        element.play().await?;

        if inner.ensure_current(request).is_err() {
            if inner.player_owner.load(Ordering::SeqCst) == request {
                if let Err(e) = element.pause().await {
                    debug!(error = %e, "Pausing stale output failed");
                }
            }
            return Err(PlaybackError::Superseded);
        }

        debug!(request, "Element output started");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if let Some(element) = self.inner.element() {
            element.pause().await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.inner.request_id.fetch_add(1, Ordering::SeqCst);
        let Some(element) = self.inner.element() else {
            return Ok(());
        };
        element.pause().await?;
        element.clear_source().await?;
        self.inner.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn toggle_playback(&self) -> Result<bool> {
        let element = self.inner.element().ok_or(PlaybackError::NoStreamLoaded)?;

        // A stalled or buffering element still counts as playing for the user.
        if !element.is_paused().await {
            element.pause().await?;
            self.inner.playing.store(false, Ordering::SeqCst);
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
        inner.setup.reset();
        inner.current.lock().take();
        inner.playing.store(false, Ordering::SeqCst);

        let element = inner.element.lock().take();
        if let Some(element) = element {
            if let Err(e) = element.pause().await {
                debug!(error = %e, "Pausing element during destroy failed");
            }
            if let Err(e) = element.clear_source().await {
                debug!(error = %e, "Detaching element source during destroy failed");
            }
        }
        debug!("Web transport destroyed");
        Ok(())
    }

    async fn verify_playback(&self) -> bool {
        let Some(element) = self.inner.element() else {
            return false;
        };
        !element.is_paused().await && self.inner.playing.load(Ordering::SeqCst)
    }

    async fn reconnect_stream(&self) -> Result<()> {
        let (url, title) = self
            .inner
            .current
            .lock()
            .clone()
            .ok_or(PlaybackError::NoStreamLoaded)?;
        debug!("Reloading live edge");
        self.play(&url, &title).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }
}
