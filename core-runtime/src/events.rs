//! # Event Bus System
//!
//! Typed engine events broadcast over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The playback engine, lifecycle watchdog, health monitor and metadata
//! arbitrator each publish what they observe or decide. Hosts subscribe for
//! analytics, UI toasts or debugging; the engine never depends on anyone
//! listening.
//!
//! ```text
//! ┌────────────────┐  emit  ┌───────────┐  subscribe  ┌────────────┐
//! │ PlaybackEngine ├───────>│           ├────────────>│ Subscriber │
//! ├────────────────┤        │ EventBus  │             └────────────┘
//! │ Watchdog       ├───────>│ (broadcast│  subscribe  ┌────────────┐
//! ├────────────────┤        │  channel) ├────────────>│ Subscriber │
//! │ HealthMonitor  ├───────>│           │             └────────────┘
//! └────────────────┘        └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped)).ok();
//! assert_eq!(rx.recv().await.unwrap(), CoreEvent::Playback(PlaybackEvent::Stopped));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers ignore that result.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Connectivity(ConnectivityEvent),
    Metadata(MetadataEvent),
    Health(HealthEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
            CoreEvent::Metadata(e) => e.description(),
            CoreEvent::Health(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Connectivity(ConnectivityEvent::Offline)
            | CoreEvent::Health(HealthEvent::CheckFailed { .. })
            | CoreEvent::Health(HealthEvent::ThresholdReached { .. })
            | CoreEvent::Playback(PlaybackEvent::Retrying { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Connectivity(ConnectivityEvent::Online)
            | CoreEvent::Health(HealthEvent::Recovered { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// State machine transitions and retry progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A play intent started connecting.
    Loading {
        stream_url: String,
        stream_name: String,
    },
    /// Audio output confirmed by the transport.
    Started {
        stream_url: String,
        stream_name: String,
    },
    Paused {
        stream_url: String,
    },
    Resumed {
        stream_url: String,
    },
    Stopped,
    /// A failed attempt will be retried after `delay_ms`.
    Retrying {
        stream_url: String,
        attempt: u32,
        delay_ms: u64,
    },
    /// An automatic reconnect re-entered the play path.
    Reconnecting {
        stream_url: String,
        /// What triggered it (`health_check`, `foreground`, `network_restored`, `transport_error`).
        reason: String,
    },
    /// Terminal failure of a play intent.
    Error {
        stream_url: Option<String>,
        message: String,
        /// Classified category (`Network`, `Autoplay`, `NotFound`, `Auth`, `Unknown`).
        category: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Connecting to stream",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Retrying { .. } => "Retrying stream connection",
            PlaybackEvent::Reconnecting { .. } => "Reconnecting stream",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    Online,
    Offline,
    /// A debounced reconnect was armed (or re-armed).
    ReconnectScheduled { delay_ms: u64 },
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::Online => "Network connection restored",
            ConnectivityEvent::Offline => "Network connection lost",
            ConnectivityEvent::ReconnectScheduled { .. } => "Reconnect scheduled",
        }
    }
}

// ============================================================================
// Metadata Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MetadataEvent {
    /// Now-playing information was applied.
    Updated {
        stream_url: String,
        title: Option<String>,
        artist: Option<String>,
        /// `push` for in-band metadata, `poll` for the HTTP feed.
        source: String,
    },
    /// A polled result lost to a recent push.
    PollDropped {
        stream_url: String,
        /// Time left in the push priority window.
        remaining_ms: u64,
    },
}

impl MetadataEvent {
    fn description(&self) -> &str {
        match self {
            MetadataEvent::Updated { .. } => "Now-playing metadata updated",
            MetadataEvent::PollDropped { .. } => "Polled metadata superseded by stream metadata",
        }
    }
}

// ============================================================================
// Health Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum HealthEvent {
    CheckFailed {
        stream_url: String,
        consecutive_failures: u32,
    },
    Recovered {
        stream_url: String,
    },
    ThresholdReached {
        stream_url: String,
        consecutive_failures: u32,
    },
}

impl HealthEvent {
    fn description(&self) -> &str {
        match self {
            HealthEvent::CheckFailed { .. } => "Playback verification failed",
            HealthEvent::Recovered { .. } => "Playback verification recovered",
            HealthEvent::ThresholdReached { .. } => "Playback verification threshold reached",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let health_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Health(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            stream_url: "https://radio.example.com/radio/8000/radio.mp3".to_string(),
            stream_name: "Red".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started()).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(started()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), started());
        assert_eq!(sub2.recv().await.unwrap(), started());
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Health(_)));

        bus.emit(started()).ok();
        let recovered = CoreEvent::Health(HealthEvent::Recovered {
            stream_url: "https://radio.example.com/radio/8000/radio.mp3".to_string(),
        });
        bus.emit(recovered.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), recovered);
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Connectivity(_)));

        bus.emit(started()).ok();
        assert!(stream.try_recv().is_none());

        bus.emit(CoreEvent::Connectivity(ConnectivityEvent::Offline))
            .ok();
        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, CoreEvent::Connectivity(ConnectivityEvent::Offline));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for attempt in 1..=5 {
            bus.emit(CoreEvent::Playback(PlaybackEvent::Retrying {
                stream_url: "http://a".to_string(),
                attempt,
                delay_ms: 1000,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            stream_url: Some("http://a".to_string()),
            message: "Stream not found".to_string(),
            category: "NotFound".to_string(),
            recoverable: false,
        });
        assert_eq!(error.severity(), EventSeverity::Error);
        assert_eq!(
            CoreEvent::Connectivity(ConnectivityEvent::Offline).severity(),
            EventSeverity::Warning
        );
        assert_eq!(started().severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Connectivity(ConnectivityEvent::ReconnectScheduled { delay_ms: 2000 })
                .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(started().description(), "Playback started");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Metadata(MetadataEvent::Updated {
            stream_url: "http://a".to_string(),
            title: Some("One More Time".to_string()),
            artist: Some("Daft Punk".to_string()),
            source: "push".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Metadata");
        assert_eq!(json["payload"]["event"], "Updated");
        assert_eq!(json["payload"]["artist"], "Daft Punk");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
