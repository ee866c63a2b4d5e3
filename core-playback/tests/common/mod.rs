//! Shared fakes for core-playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
use bridge_traits::media::{
    AudioElement, AudioElementFactory, ElementEvent, ElementEventStream, LiveSource, NativePlayer,
    PlayerEvent, PlayerEventStream, PlayerState,
};
use bridge_traits::network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkType};
use core_playback::config::RetryPolicy;
use core_playback::error::{PlaybackError, Result};
use core_playback::{PlaybackEngine, StreamTransport, TransportEvent, TransportKind};
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const RED: &str = "https://radio.example.com/radio/8000/radio.mp3";
pub const BLUE: &str = "https://radio.example.com/radio/8010/radio.mp3";

// ============================================================================
// Errors
// ============================================================================

pub fn network_error() -> PlaybackError {
    PlaybackError::Bridge(BridgeError::Media {
        name: "NetworkError".to_string(),
        message: "Failed to fetch".to_string(),
    })
}

pub fn not_found_error() -> PlaybackError {
    PlaybackError::Bridge(BridgeError::Media {
        name: "Error".to_string(),
        message: "HTTP 404 not found".to_string(),
    })
}

pub fn autoplay_error() -> PlaybackError {
    PlaybackError::Bridge(BridgeError::Media {
        name: "NotAllowedError".to_string(),
        message: "play() failed because the user didn't interact with the document first"
            .to_string(),
    })
}

// ============================================================================
// Scripted transport
// ============================================================================

/// Transport whose `play()` results and delays are scripted per call.
pub struct ScriptedTransport {
    kind: TransportKind,
    play_results: Mutex<VecDeque<Result<()>>>,
    play_delays: Mutex<VecDeque<Duration>>,
    plays: Mutex<Vec<String>>,
    verified: AtomicBool,
    verify_calls: AtomicUsize,
    playing: AtomicBool,
    fail_stop: AtomicBool,
    stops: AtomicUsize,
    destroys: AtomicUsize,
    setups: AtomicUsize,
    events: broadcast::Sender<TransportEvent>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            kind,
            play_results: Mutex::new(VecDeque::new()),
            play_delays: Mutex::new(VecDeque::new()),
            plays: Mutex::new(Vec::new()),
            verified: AtomicBool::new(true),
            verify_calls: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            setups: AtomicUsize::new(0),
            events,
        })
    }

    pub fn native() -> Arc<Self> {
        Self::new(TransportKind::Native)
    }

    /// Queue results for upcoming `play()` calls. Unscripted calls succeed.
    pub fn script_plays(&self, results: impl IntoIterator<Item = Result<()>>) {
        self.play_results.lock().extend(results);
    }

    /// Queue delays for upcoming `play()` calls.
    pub fn script_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.play_delays.lock().extend(delays);
    }

    pub fn set_verified(&self, verified: bool) {
        self.verified.store(verified, Ordering::SeqCst);
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn play_calls(&self) -> Vec<String> {
        self.plays.lock().clone()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().len()
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn setup_count(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    /// Inject a primitive event as if the host emitted it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn setup(&self) -> bool {
        self.setups.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn play(&self, url: &str, _title: &str) -> Result<()> {
        self.plays.lock().push(url.to_string());
        let delay = self.play_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.play_results.lock().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.playing.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn pause(&self) -> Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(PlaybackError::Bridge(BridgeError::OperationFailed(
                "stop failed".to_string(),
            )));
        }
        Ok(())
    }

    async fn toggle_playback(&self) -> Result<bool> {
        let was_playing = self.playing.fetch_xor(true, Ordering::SeqCst);
        Ok(!was_playing)
    }

    async fn destroy(&self) -> Result<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn verify_playback(&self) -> bool {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verified.load(Ordering::SeqCst)
    }

    async fn reconnect_stream(&self) -> Result<()> {
        let last = self.plays.lock().last().cloned();
        match last {
            Some(url) => self.play(&url, "").await,
            None => Err(PlaybackError::NoStreamLoaded),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

pub fn engine_with(transport: &Arc<ScriptedTransport>) -> (Arc<PlaybackEngine>, EventBus) {
    let bus = EventBus::new(256);
    let engine = PlaybackEngine::new(
        Arc::clone(transport) as Arc<dyn StreamTransport>,
        RetryPolicy::default(),
        bus.clone(),
    );
    (engine, bus)
}

/// Engine over an arbitrary transport, e.g. the real adapters on fakes.
pub fn engine_over(transport: Arc<dyn StreamTransport>) -> (Arc<PlaybackEngine>, EventBus) {
    let bus = EventBus::new(256);
    let engine = PlaybackEngine::new(transport, RetryPolicy::default(), bus.clone());
    (engine, bus)
}

/// Drain every event currently queued on `receiver`.
pub fn drain(receiver: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Native player
// ============================================================================

/// In-memory native player recording every call.
pub struct FakeNativePlayer {
    state: Mutex<PlayerState>,
    calls: Mutex<Vec<String>>,
    init_delay: Mutex<Duration>,
    play_delays: Mutex<VecDeque<Duration>>,
    initializations: AtomicUsize,
    releases: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<PlayerEvent>>>,
}

impl FakeNativePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PlayerState::None),
            calls: Mutex::new(Vec::new()),
            init_delay: Mutex::new(Duration::ZERO),
            play_delays: Mutex::new(VecDeque::new()),
            initializations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            events: Mutex::new(None),
        })
    }

    pub fn set_init_delay(&self, delay: Duration) {
        *self.init_delay.lock() = delay;
    }

    pub fn script_play_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.play_delays.lock().extend(delays);
    }

    pub fn set_state(&self, state: PlayerState) {
        *self.state.lock() = state;
    }

    pub fn current_state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: PlayerEvent) {
        if let Some(sender) = self.events.lock().as_ref() {
            let _ = sender.send(event);
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

struct ChannelPlayerEvents(mpsc::UnboundedReceiver<PlayerEvent>);

#[async_trait]
impl PlayerEventStream for ChannelPlayerEvents {
    async fn next(&mut self) -> Option<PlayerEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl NativePlayer for FakeNativePlayer {
    async fn initialize(&self) -> BridgeResult<()> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.init_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record("initialize");
        Ok(())
    }

    async fn reset(&self) -> BridgeResult<()> {
        self.record("reset");
        self.set_state(PlayerState::None);
        Ok(())
    }

    async fn load(&self, source: LiveSource) -> BridgeResult<()> {
        self.record(format!("load {}", source.url));
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        let delay = self.play_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        self.set_state(PlayerState::Paused);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        self.set_state(PlayerState::Stopped);
        Ok(())
    }

    async fn state(&self) -> BridgeResult<PlayerState> {
        Ok(self.current_state())
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn PlayerEventStream>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.events.lock() = Some(sender);
        Ok(Box::new(ChannelPlayerEvents(receiver)))
    }

    async fn release(&self) -> BridgeResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.record("release");
        Ok(())
    }
}

// ============================================================================
// Audio element
// ============================================================================

/// In-memory media element. `play()` flips `paused` but only an emitted
/// `Playing` event marks audio as flowing.
pub struct FakeAudioElement {
    paused: AtomicBool,
    source: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedSender<ElementEvent>>>,
}

impl FakeAudioElement {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            paused: AtomicBool::new(true),
            source: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
        })
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn emit(&self, event: ElementEvent) {
        if let Some(sender) = self.events.lock().as_ref() {
            let _ = sender.send(event);
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

struct ChannelElementEvents(mpsc::UnboundedReceiver<ElementEvent>);

#[async_trait]
impl ElementEventStream for ChannelElementEvents {
    async fn next(&mut self) -> Option<ElementEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl AudioElement for FakeAudioElement {
    async fn set_source(&self, url: &str) -> BridgeResult<()> {
        self.record(format!("set_source {}", url));
        *self.source.lock() = Some(url.to_string());
        Ok(())
    }

    async fn clear_source(&self) -> BridgeResult<()> {
        self.record("clear_source");
        self.source.lock().take();
        Ok(())
    }

    async fn load(&self) -> BridgeResult<()> {
        self.record("load");
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn ElementEventStream>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.events.lock() = Some(sender);
        Ok(Box::new(ChannelElementEvents(receiver)))
    }
}

/// Factory handing out one shared element.
pub struct FakeElementFactory {
    element: Arc<FakeAudioElement>,
    created: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeElementFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            element: FakeAudioElement::new(),
            created: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn element(&self) -> Arc<FakeAudioElement> {
        Arc::clone(&self.element)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl AudioElementFactory for FakeElementFactory {
    async fn create_element(&self) -> BridgeResult<Arc<dyn AudioElement>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Arc::clone(&self.element) as Arc<dyn AudioElement>)
    }
}

// ============================================================================
// Host signals
// ============================================================================

/// Network monitor fed from a channel.
pub struct ChannelNetworkMonitor {
    connected: bool,
    changes: Mutex<Option<mpsc::UnboundedReceiver<NetworkInfo>>>,
}

impl ChannelNetworkMonitor {
    pub fn new(connected: bool) -> (Arc<Self>, mpsc::UnboundedSender<NetworkInfo>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let monitor = Arc::new(Self {
            connected,
            changes: Mutex::new(Some(receiver)),
        });
        (monitor, sender)
    }
}

struct ChannelNetworkChanges(mpsc::UnboundedReceiver<NetworkInfo>);

#[async_trait]
impl NetworkChangeStream for ChannelNetworkChanges {
    async fn next(&mut self) -> Option<NetworkInfo> {
        self.0.recv().await
    }
}

#[async_trait]
impl NetworkMonitor for ChannelNetworkMonitor {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(if self.connected {
            NetworkInfo::connected(NetworkType::WiFi)
        } else {
            NetworkInfo::disconnected()
        })
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        let receiver = self
            .changes
            .lock()
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("already subscribed".to_string()))?;
        Ok(Box::new(ChannelNetworkChanges(receiver)))
    }
}

pub fn online() -> NetworkInfo {
    NetworkInfo::connected(NetworkType::WiFi)
}

pub fn offline() -> NetworkInfo {
    NetworkInfo::disconnected()
}

/// Lifecycle observer fed from a channel.
pub struct ChannelLifecycleObserver {
    changes: Mutex<Option<mpsc::UnboundedReceiver<LifecycleState>>>,
}

impl ChannelLifecycleObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<LifecycleState>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let observer = Arc::new(Self {
            changes: Mutex::new(Some(receiver)),
        });
        (observer, sender)
    }
}

struct ChannelLifecycleChanges(mpsc::UnboundedReceiver<LifecycleState>);

#[async_trait]
impl LifecycleChangeStream for ChannelLifecycleChanges {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.0.recv().await
    }
}

#[async_trait]
impl LifecycleObserver for ChannelLifecycleObserver {
    async fn get_state(&self) -> BridgeResult<LifecycleState> {
        Ok(LifecycleState::Active)
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
        let receiver = self
            .changes
            .lock()
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("already subscribed".to_string()))?;
        Ok(Box::new(ChannelLifecycleChanges(receiver)))
    }
}
