//! # Core Playback Traits
//!
//! Abstractions the player is built on. These sit above the bridge traits:
//! [`MediaBackend`](bridge_traits::playback::MediaBackend) is the host's
//! media element, while the traits here are what the rest of the core and
//! the host shell program against.
//!
//! - [`StreamResolver`] turns a track into something the backend can load
//! - [`PlaybackEngine`] is the queue/transport state machine

use async_trait::async_trait;
use bridge_traits::playback::{MediaEvent, MediaSessionAction, MediaSource};
use core_library::models::{AudioQuality, Track};
use std::time::Duration;

use crate::error::Result;
use crate::queue::PlayQueue;
use crate::state::{PlaybackSnapshot, RepeatMode};

/// Resolves a playable source for a track.
///
/// `Ok(None)` means the track has no stream at that quality; the player
/// treats it as a no-op. Errors are reported to the caller.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, track: &Track, quality: AudioQuality) -> Result<Option<MediaSource>>;
}

/// Queue and transport control.
///
/// # Example
///
/// ```ignore
/// use core_playback::PlaybackEngine;
///
/// async fn play_results(engine: &dyn PlaybackEngine, results: Vec<Track>) -> Result<()> {
///     engine.play_track(results[2].clone(), results).await?;
///     engine.skip_next().await
/// }
/// ```
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Play `track`, making `context` the queue.
    ///
    /// If the track is in `context` the queue starts at its position;
    /// otherwise the queue becomes `[track, ...context]` at index 0.
    async fn play_track(&self, track: Track, context: Vec<Track>) -> Result<()>;

    /// Load and play the track at `index` of the current queue.
    async fn play_index(&self, index: usize) -> Result<()>;

    async fn toggle_play_pause(&self) -> Result<()>;

    async fn skip_next(&self) -> Result<()>;

    /// Restart the track when past the restart threshold, otherwise go back.
    async fn skip_prev(&self) -> Result<()>;

    async fn seek_to(&self, position: Duration) -> Result<()>;

    async fn reorder_queue(&self, from: usize, to: usize) -> Result<()>;

    async fn toggle_shuffle(&self) -> Result<bool>;

    async fn add_to_queue(&self, track: Track) -> Result<()>;

    /// Queue a track right after the current one.
    async fn play_next(&self, track: Track) -> Result<()>;

    async fn remove_from_queue(&self, index: usize) -> Result<()>;

    async fn clear_queue(&self) -> Result<()>;

    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn toggle_mute(&self) -> Result<bool>;

    async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()>;

    /// Off -> All -> One -> Off. Returns the new mode.
    async fn cycle_repeat_mode(&self) -> Result<RepeatMode>;

    async fn snapshot(&self) -> PlaybackSnapshot;

    async fn queue(&self) -> PlayQueue;

    /// Feed an event from the media backend.
    async fn handle_media_event(&self, event: MediaEvent) -> Result<()>;

    /// Dispatch an action requested through the OS media session.
    async fn handle_session_action(&self, action: MediaSessionAction) -> Result<()>;
}
