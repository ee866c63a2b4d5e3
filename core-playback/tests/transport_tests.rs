//! Integration tests for the native and web stream transports

mod common;

use bridge_traits::media::{
    AudioElementFactory, ElementEvent, InBandMetadata, NativePlayer, PlayerEvent, PlayerState,
};
use common::*;
use core_playback::error::PlaybackError;
use core_playback::transport::{NativeTransport, WebTransport};
use core_playback::{select_transport, StreamTransport, TransportCapabilities, TransportEvent, TransportKind};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Native
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_native_concurrent_setup_initializes_once() {
    let player = FakeNativePlayer::new();
    player.set_init_delay(Duration::from_millis(100));
    let transport = NativeTransport::new(player.clone());

    let (first, second) = tokio::join!(transport.setup(), transport.setup());

    assert!(first && second);
    assert_eq!(player.initializations(), 1);
    assert!(transport.setup().await);
    assert_eq!(player.initializations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_native_destroy_during_setup_releases_player() {
    let player = FakeNativePlayer::new();
    player.set_init_delay(Duration::from_millis(100));
    let transport = Arc::new(NativeTransport::new(player.clone()));

    let pending = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.setup().await })
    };
    settle().await;
    transport.destroy().await.unwrap();

    assert!(!pending.await.unwrap());
    assert_eq!(player.releases(), 1);

    // A fresh setup after destroy starts over.
    assert!(transport.setup().await);
    assert_eq!(player.initializations(), 2);
}

#[tokio::test]
async fn test_native_play_loads_live_edge() {
    let player = FakeNativePlayer::new();
    let transport = NativeTransport::new(player.clone());

    transport.play(RED, "Red").await.unwrap();

    assert_eq!(
        player.calls(),
        vec![
            "initialize".to_string(),
            "pause".to_string(),
            "reset".to_string(),
            format!("load {}", RED),
            "play".to_string(),
        ]
    );
    assert!(transport.verify_playback().await);
}

#[tokio::test(start_paused = true)]
async fn test_native_stale_output_is_paused() {
    let player = FakeNativePlayer::new();
    let transport = Arc::new(NativeTransport::new(player.clone()));
    assert!(transport.setup().await);
    player.script_play_delays([Duration::from_millis(100)]);

    let pending = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.play(RED, "Red").await })
    };
    settle().await;
    transport.stop().await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(PlaybackError::Superseded)));
    assert_eq!(player.current_state(), PlayerState::Paused);
    assert!(!transport.verify_playback().await);
}

#[tokio::test(start_paused = true)]
async fn test_native_newer_play_keeps_output() {
    let player = FakeNativePlayer::new();
    let transport = Arc::new(NativeTransport::new(player.clone()));
    assert!(transport.setup().await);
    player.script_play_delays([Duration::from_millis(100)]);

    let pending = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.play(RED, "Red").await })
    };
    settle().await;
    transport.play(BLUE, "Blue").await.unwrap();

    assert!(matches!(pending.await.unwrap(), Err(PlaybackError::Superseded)));
    assert_eq!(player.current_state(), PlayerState::Playing);
    let last_load = player
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("load"))
        .last();
    assert_eq!(last_load, Some(format!("load {}", BLUE)));
}

#[tokio::test]
async fn test_native_toggle_requires_loaded_stream() {
    let transport = NativeTransport::new(FakeNativePlayer::new());
    assert!(matches!(
        transport.toggle_playback().await,
        Err(PlaybackError::NoStreamLoaded)
    ));
}

#[tokio::test]
async fn test_native_toggle_pauses_then_reloads() {
    let player = FakeNativePlayer::new();
    let transport = NativeTransport::new(player.clone());
    transport.play(RED, "Red").await.unwrap();

    assert!(!transport.toggle_playback().await.unwrap());
    assert_eq!(player.current_state(), PlayerState::Paused);

    assert!(transport.toggle_playback().await.unwrap());
    assert_eq!(player.current_state(), PlayerState::Playing);
    let loads = player
        .calls()
        .iter()
        .filter(|call| call.starts_with("load"))
        .count();
    assert_eq!(loads, 2);
}

#[tokio::test]
async fn test_native_forwards_player_events() {
    let player = FakeNativePlayer::new();
    let transport = NativeTransport::new(player.clone());
    let mut events = transport.subscribe();
    assert!(transport.setup().await);

    let metadata = InBandMetadata {
        title: Some("One More Time".to_string()),
        artist: Some("Daft Punk".to_string()),
        raw: None,
    };
    player.emit(PlayerEvent::Metadata(metadata.clone()));
    player.emit(PlayerEvent::StateChanged(PlayerState::Buffering));

    assert_eq!(events.recv().await.unwrap(), TransportEvent::Metadata(metadata));
    assert_eq!(
        events.recv().await.unwrap(),
        TransportEvent::StateChanged(PlayerState::Buffering)
    );
}

// ============================================================================
// Web
// ============================================================================

#[tokio::test]
async fn test_web_play_detaches_then_reloads() {
    let factory = FakeElementFactory::new();
    let transport = WebTransport::new(factory.clone());

    transport.play(RED, "Red").await.unwrap();

    let element = factory.element();
    assert_eq!(
        element.calls(),
        vec![
            "pause".to_string(),
            "clear_source".to_string(),
            format!("set_source {}", RED),
            "load".to_string(),
            "play".to_string(),
        ]
    );
    assert_eq!(element.source().as_deref(), Some(RED));
}

#[tokio::test]
async fn test_web_verify_tracks_element_events() {
    let factory = FakeElementFactory::new();
    let transport = WebTransport::new(factory.clone());
    let mut events = transport.subscribe();
    transport.play(RED, "Red").await.unwrap();

    // Unpaused but not yet flowing.
    assert!(!transport.verify_playback().await);

    factory.element().emit(ElementEvent::Playing);
    assert_eq!(
        events.recv().await.unwrap(),
        TransportEvent::StateChanged(PlayerState::Playing)
    );
    assert!(transport.verify_playback().await);

    factory.element().emit(ElementEvent::Stalled);
    assert_eq!(
        events.recv().await.unwrap(),
        TransportEvent::StateChanged(PlayerState::Buffering)
    );
    assert!(!transport.verify_playback().await);
}

#[tokio::test(start_paused = true)]
async fn test_web_concurrent_setup_creates_one_element() {
    let factory = FakeElementFactory::new();
    factory.set_delay(Duration::from_millis(50));
    let transport = WebTransport::new(factory.clone());

    let (first, second) = tokio::join!(transport.setup(), transport.setup());

    assert!(first && second);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_web_destroy_detaches_source() {
    let factory = FakeElementFactory::new();
    let transport = WebTransport::new(factory.clone());
    transport.play(RED, "Red").await.unwrap();

    transport.destroy().await.unwrap();

    let element = factory.element();
    assert!(element.source().is_none());
    assert!(!transport.verify_playback().await);
    assert!(matches!(
        transport.reconnect_stream().await,
        Err(PlaybackError::NoStreamLoaded)
    ));
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_select_transport_prefers_native() {
    let both = TransportCapabilities {
        native_player: Some(FakeNativePlayer::new() as Arc<dyn NativePlayer>),
        audio_elements: Some(FakeElementFactory::new() as Arc<dyn AudioElementFactory>),
    };
    assert_eq!(select_transport(both).unwrap().kind(), TransportKind::Native);

    let web_only = TransportCapabilities {
        native_player: None,
        audio_elements: Some(FakeElementFactory::new() as Arc<dyn AudioElementFactory>),
    };
    assert_eq!(select_transport(web_only).unwrap().kind(), TransportKind::Web);

    assert!(matches!(
        select_transport(TransportCapabilities::default()),
        Err(PlaybackError::InvalidConfig(_))
    ));
}
