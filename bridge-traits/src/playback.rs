//! Media backend and media session bridges.
//!
//! The core drives exactly one media element per process: an HTML audio
//! element on the web, an AVPlayer / ExoPlayer instance on mobile, a native
//! sink on desktop. [`MediaBackend`] is that element. It reports what it is
//! doing through [`MediaEvent`]s; the playback engine derives its state from
//! those events rather than tracking it independently.
//!
//! [`MediaSession`] is the OS-level "now playing" integration (lock screen,
//! hardware media keys, notification controls).

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;

/// Audio source handed to the media backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    /// Playable URL (usually a signed CDN link decoded from a manifest).
    pub url: String,
    /// HTTP headers the backend must send when fetching the stream.
    pub headers: HashMap<String, String>,
    /// Optional MIME hint (`audio/flac`, `application/dash+xml`, ...).
    pub mime_type: Option<String>,
}

impl MediaSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Whether the URL points at a DASH manifest rather than a flat file.
    pub fn is_dash(&self) -> bool {
        self.mime_type.as_deref() == Some("application/dash+xml") || self.url.ends_with(".mpd")
    }
}

/// Events emitted by the media backend, mirroring media element events.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// A new source started loading.
    LoadStart,
    /// Playback stalled waiting for data.
    Waiting,
    /// Enough data is buffered to play.
    CanPlay,
    Playing,
    Paused,
    TimeUpdate(Duration),
    DurationChange(Duration),
    VolumeChange { volume: f32, muted: bool },
    /// The current source played to its end.
    Ended,
    Error(String),
}

/// The single shared media element.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{MediaBackend, MediaSource};
///
/// async fn start(backend: &dyn MediaBackend, url: &str) -> Result<()> {
///     backend.load(MediaSource::new(url)).await?;
///     backend.play().await
/// }
/// ```
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Replace the current source. Playback position resets to zero.
    async fn load(&self, source: MediaSource) -> Result<()>;

    /// Begin or resume playback of the loaded source.
    async fn play(&self) -> Result<()>;

    /// Pause without unloading.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Set output volume, normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Current playback position as reported by the element.
    async fn position(&self) -> Result<Duration>;

    /// Subscribe to the element's events.
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;
}

/// One artwork rendition for the media session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub src: String,
    /// `"<w>x<h>"`
    pub sizes: String,
    pub mime_type: String,
}

/// Metadata shown by the OS "now playing" surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
}

/// Coarse state reported to the media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPlaybackState {
    None,
    Paused,
    Playing,
}

/// Position information for scrubbers on lock screens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub duration: Duration,
    pub position: Duration,
    pub playback_rate: f64,
}

/// Actions the OS may request through the media session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaSessionAction {
    Play,
    Pause,
    TogglePlayPause,
    SeekTo(Duration),
    SeekBackward(Option<Duration>),
    SeekForward(Option<Duration>),
    NextTrack,
    PreviousTrack,
}

/// OS media session integration.
///
/// Action handlers are not registered here: the host forwards incoming
/// [`MediaSessionAction`]s to the playback engine.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn set_metadata(&self, metadata: NowPlaying) -> Result<()>;

    async fn set_playback_state(&self, state: SessionPlaybackState) -> Result<()>;

    async fn set_position_state(&self, state: PositionState) -> Result<()>;

    /// Remove all now-playing information.
    async fn clear(&self) -> Result<()>;
}
