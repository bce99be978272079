//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast`, so hosts can follow
//! playback, queue, library and API activity without polling.
//!
//! ```text
//! ┌──────────────┐  emit  ┌───────────┐  subscribe  ┌────────────┐
//! │ Player       ├───────>│           ├────────────>│ UI shell   │
//! ├──────────────┤        │ EventBus  │             ├────────────┤
//! │ Library      ├───────>│           ├────────────>│ Analytics  │
//! ├──────────────┤        │           │             └────────────┘
//! │ API client   ├───────>│           │
//! └──────────────┘        └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Queue(QueueEvent::Cleared)).ok();
//! assert_eq!(stream.recv().await.unwrap(), CoreEvent::Queue(QueueEvent::Cleared));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error. Emitters ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Queue(QueueEvent),
    Library(LibraryEvent),
    Api(ApiEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Api(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Api(ApiEvent::RateLimited { .. }) => EventSeverity::Warning,
            CoreEvent::Api(ApiEvent::InstanceFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }) => EventSeverity::Debug,
            CoreEvent::Queue(_) | CoreEvent::Library(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A resolved stream was handed to the media backend.
    TrackLoaded {
        track_id: i64,
        title: String,
        quality: String,
    },
    Started {
        track_id: i64,
    },
    Paused {
        track_id: i64,
        position_ms: u64,
    },
    /// The queue ran out with repeat off.
    Stopped,
    Completed {
        track_id: i64,
    },
    PositionChanged {
        position_ms: u64,
        duration_ms: u64,
    },
    VolumeChanged {
        volume: f32,
        muted: bool,
    },
    Error {
        track_id: Option<i64>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackLoaded { .. } => "Track loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The whole queue was replaced (e.g. playing from a search result list).
    Replaced {
        length: usize,
        index: Option<usize>,
    },
    TrackAdded {
        track_id: i64,
        position: usize,
    },
    TrackRemoved {
        track_id: i64,
    },
    Reordered {
        from: usize,
        to: usize,
    },
    IndexChanged {
        index: usize,
    },
    Cleared,
    ShuffleChanged {
        enabled: bool,
    },
    RepeatModeChanged {
        mode: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Replaced { .. } => "Queue replaced",
            QueueEvent::TrackAdded { .. } => "Track added to queue",
            QueueEvent::TrackRemoved { .. } => "Track removed from queue",
            QueueEvent::Reordered { .. } => "Queue reordered",
            QueueEvent::IndexChanged { .. } => "Queue position changed",
            QueueEvent::Cleared => "Queue cleared",
            QueueEvent::ShuffleChanged { .. } => "Shuffle toggled",
            QueueEvent::RepeatModeChanged { .. } => "Repeat mode changed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    FavoriteAdded { track_id: i64 },
    FavoriteRemoved { track_id: i64 },
    RecentlyPlayed { track_id: i64 },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::FavoriteAdded { .. } => "Track added to favorites",
            LibraryEvent::FavoriteRemoved { .. } => "Track removed from favorites",
            LibraryEvent::RecentlyPlayed { .. } => "Track recorded as recently played",
        }
    }
}

// ============================================================================
// API Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ApiEvent {
    /// An instance used up its attempts; the client moved on.
    InstanceFailed { instance: String, message: String },
    RateLimited { instance: String },
    CachePruned { api_entries: usize, stream_entries: usize },
}

impl ApiEvent {
    fn description(&self) -> &str {
        match self {
            ApiEvent::InstanceFailed { .. } => "API instance failed",
            ApiEvent::RateLimited { .. } => "API rate limited",
            ApiEvent::CachePruned { .. } => "Caches pruned",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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
// Tests
// ============================================================================
