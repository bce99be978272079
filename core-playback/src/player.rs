//! # Player
//!
//! [`Player`] is the [`PlaybackEngine`] driving a single [`MediaBackend`].
//!
//! ## Locking
//!
//! Queue and state live behind one `tokio::sync::Mutex`. The lock is taken
//! to read or change state and released before any call into the resolver
//! or the backend.
//!
//! ## Load tokens
//!
//! Every load takes the next value of a monotonically increasing token
//! before resolving the stream. When the resolution finishes, the token is
//! compared with the latest one; if another load started meanwhile the
//! result is dropped without touching the backend. Rapid skips therefore
//! always end on the last requested track.
//!
//! The queue only moves once a stream has been resolved: a track that
//! cannot be resolved leaves the queue and the backend where they were.

use async_trait::async_trait;
use bridge_traits::playback::{MediaBackend, MediaEvent, MediaSession, MediaSessionAction};
use core_library::models::{AudioQuality, Track};
use core_library::store::LibraryStore;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, PlaybackEvent, QueueEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{Advance, PlayQueue, Retreat};
use crate::session::SessionSync;
use crate::state::{PlaybackSnapshot, PlaybackState, PlaybackStatus, RepeatMode};
use crate::traits::{PlaybackEngine, StreamResolver};

/// Step used by session seek actions that carry no offset.
const DEFAULT_SEEK_STEP: Duration = Duration::from_secs(10);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// What a load commits once its stream resolves.
enum LoadTarget {
    /// Move to this index of the current queue.
    Index(usize),
    /// Replace the whole queue; its current track is loaded.
    Replace(PlayQueue),
}

struct Inner {
    queue: PlayQueue,
    playback: PlaybackState,
    repeat: RepeatMode,
    quality: AudioQuality,
}

pub struct Player {
    backend: Arc<dyn MediaBackend>,
    resolver: Arc<dyn StreamResolver>,
    library: Option<Arc<dyn LibraryStore>>,
    session: SessionSync,
    events: Option<EventBus>,
    restart_threshold: Duration,
    inner: Mutex<Inner>,
    load_token: AtomicU64,
}

impl Player {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        resolver: Arc<dyn StreamResolver>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            backend,
            resolver,
            library: None,
            session: SessionSync::new(None, config.cover_proxy_base.clone()),
            events: None,
            restart_threshold: config.restart_threshold,
            inner: Mutex::new(Inner {
                queue: PlayQueue::new(),
                playback: PlaybackState::new(config.initial_volume),
                repeat: RepeatMode::Off,
                quality: config.quality,
            }),
            load_token: AtomicU64::new(0),
        }
    }

    /// Record every loaded track as recently played in `store`.
    pub fn with_library(mut self, store: Arc<dyn LibraryStore>) -> Self {
        self.library = Some(store);
        self
    }

    /// Keep the OS media session in sync. Artwork URLs use the proxy base
    /// the player was configured with.
    pub fn with_session(mut self, session: Arc<dyn MediaSession>) -> Self {
        self.session = self.session.attach(session);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Quality used for subsequent loads.
    pub async fn set_quality(&self, quality: AudioQuality) {
        self.inner.lock().await.quality = quality;
    }

    pub async fn quality(&self) -> AudioQuality {
        self.inner.lock().await.quality
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Resolve `target` and, if it is still the latest load, commit it to
    /// the queue and play it.
    ///
    /// Nothing changes when the stream cannot be resolved or a newer load
    /// started meanwhile.
    async fn load(&self, target: LoadTarget) -> Result<()> {
        let (token, track, quality) = {
            let inner = self.inner.lock().await;
            let track = match &target {
                LoadTarget::Index(index) => inner.queue.get(*index).cloned(),
                LoadTarget::Replace(queue) => queue.current().cloned(),
            };
            let Some(track) = track else {
                return Ok(());
            };
            let token = self.load_token.fetch_add(1, Ordering::SeqCst) + 1;
            (token, track, inner.quality)
        };

        let resolved = self.resolver.resolve(&track, quality).await;

        if self.is_superseded(token) {
            debug!(track_id = track.id, token, "Discarding superseded load");
            return Ok(());
        }

        let source = match resolved {
            Ok(Some(source)) => source,
            Ok(None) => {
                warn!(track_id = track.id, quality = quality.as_str(), "No stream available, skipping load");
                return Ok(());
            }
            Err(e) => {
                warn!(track_id = track.id, error = %e, "Stream resolution failed");
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    track_id: Some(track.id),
                    message: e.to_string(),
                    recoverable: true,
                }));
                return Err(e);
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if self.is_superseded(token) {
                debug!(track_id = track.id, token, "Discarding superseded load");
                return Ok(());
            }
            match target {
                LoadTarget::Index(index) => {
                    if inner.queue.get(index).map(|t| t.id) != Some(track.id) {
                        debug!(track_id = track.id, index, "Queue changed while resolving, dropping load");
                        return Ok(());
                    }
                    if inner.queue.index() != Some(index) {
                        inner.queue.set_index(index)?;
                        self.emit(CoreEvent::Queue(QueueEvent::IndexChanged { index }));
                    }
                }
                LoadTarget::Replace(queue) => {
                    inner.queue = queue;
                    self.emit(CoreEvent::Queue(QueueEvent::Replaced {
                        length: inner.queue.len(),
                        index: inner.queue.index(),
                    }));
                }
            }
        }

        self.backend.load(source).await?;
        self.inner.lock().await.playback.loaded = true;
        self.backend.play().await?;

        info!(track_id = track.id, title = %track.title, quality = quality.as_str(), "Track loaded");
        self.emit(CoreEvent::Playback(PlaybackEvent::TrackLoaded {
            track_id: track.id,
            title: track.title.clone(),
            quality: quality.as_str().to_string(),
        }));

        self.session.track_changed(&track).await;
        self.record_played(&track).await;
        Ok(())
    }

    fn is_superseded(&self, token: u64) -> bool {
        self.load_token.load(Ordering::SeqCst) != token
    }

    async fn record_played(&self, track: &Track) {
        let Some(library) = &self.library else {
            return;
        };
        match library.add_recently_played(track).await {
            Ok(()) => self.emit(CoreEvent::Library(LibraryEvent::RecentlyPlayed {
                track_id: track.id,
            })),
            Err(e) => warn!(track_id = track.id, error = %e, "Failed to record recently played"),
        }
    }

    async fn advance(&self, advance: Advance) -> Result<()> {
        match advance {
            Advance::Restart => {
                self.backend.seek(Duration::ZERO).await?;
                self.backend.play().await?;
                Ok(())
            }
            Advance::Move(index) => self.load(LoadTarget::Index(index)).await,
            Advance::Stop => {
                debug!("End of queue");
                self.backend.pause().await?;
                self.backend.seek(Duration::ZERO).await?;
                self.emit(CoreEvent::Playback(PlaybackEvent::Stopped));
                Ok(())
            }
        }
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(event);
        }
    }
}

#[async_trait]
impl PlaybackEngine for Player {
    #[instrument(skip(self, track, context), fields(track_id = track.id, context_len = context.len()))]
    async fn play_track(&self, track: Track, context: Vec<Track>) -> Result<()> {
        let queue = {
            let inner = self.inner.lock().await;
            let mut queue = PlayQueue::new();
            queue.play_from_context(track, context);
            if inner.queue.is_shuffled() {
                queue.shuffle(&mut rand::thread_rng());
            }
            queue
        };
        self.load(LoadTarget::Replace(queue)).await
    }

    async fn play_index(&self, index: usize) -> Result<()> {
        let len = self.inner.lock().await.queue.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfRange { index, len });
        }
        self.load(LoadTarget::Index(index)).await
    }

    async fn toggle_play_pause(&self) -> Result<()> {
        let (playing, loaded, current) = {
            let inner = self.inner.lock().await;
            (
                inner.playback.is_playing,
                inner.playback.loaded,
                inner.queue.index(),
            )
        };

        if playing {
            self.backend.pause().await?;
        } else if loaded {
            self.backend.play().await?;
        } else if let Some(index) = current {
            self.load(LoadTarget::Index(index)).await?;
        } else {
            return Err(PlaybackError::NoTrackLoaded);
        }
        Ok(())
    }

    async fn skip_next(&self) -> Result<()> {
        let advance = {
            let inner = self.inner.lock().await;
            inner.queue.next(inner.repeat)
        };
        self.advance(advance).await
    }

    async fn skip_prev(&self) -> Result<()> {
        let position = self.backend.position().await?;
        if position > self.restart_threshold {
            return self.backend.seek(Duration::ZERO).await.map_err(Into::into);
        }

        let retreat = {
            let inner = self.inner.lock().await;
            inner.queue.previous(inner.repeat)
        };
        match retreat {
            Retreat::Restart => Ok(self.backend.seek(Duration::ZERO).await?),
            Retreat::Move(index) => self.load(LoadTarget::Index(index)).await,
        }
    }

    async fn seek_to(&self, position: Duration) -> Result<()> {
        Ok(self.backend.seek(position).await?)
    }

    async fn reorder_queue(&self, from: usize, to: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let before = inner.queue.index();
        inner.queue.reorder(from, to)?;

        self.emit(CoreEvent::Queue(QueueEvent::Reordered { from, to }));
        if let Some(index) = inner.queue.index().filter(|i| Some(*i) != before) {
            self.emit(CoreEvent::Queue(QueueEvent::IndexChanged { index }));
        }
        Ok(())
    }

    async fn toggle_shuffle(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let enabled = if inner.queue.is_shuffled() {
            inner.queue.unshuffle();
            false
        } else {
            inner.queue.shuffle(&mut rand::thread_rng());
            true
        };

        debug!(enabled, "Shuffle toggled");
        self.emit(CoreEvent::Queue(QueueEvent::ShuffleChanged { enabled }));
        Ok(enabled)
    }

    async fn add_to_queue(&self, track: Track) -> Result<()> {
        let track_id = track.id;
        let position = self.inner.lock().await.queue.push(track);
        self.emit(CoreEvent::Queue(QueueEvent::TrackAdded { track_id, position }));
        Ok(())
    }

    async fn play_next(&self, track: Track) -> Result<()> {
        let track_id = track.id;
        let position = self.inner.lock().await.queue.insert_next(track);
        self.emit(CoreEvent::Queue(QueueEvent::TrackAdded { track_id, position }));
        Ok(())
    }

    async fn remove_from_queue(&self, index: usize) -> Result<()> {
        let removed = self.inner.lock().await.queue.remove(index)?;
        self.emit(CoreEvent::Queue(QueueEvent::TrackRemoved {
            track_id: removed.id,
        }));
        Ok(())
    }

    async fn clear_queue(&self) -> Result<()> {
        // Invalidate any load still resolving.
        self.load_token.fetch_add(1, Ordering::SeqCst);
        {
            let mut inner = self.inner.lock().await;
            inner.queue.clear();
            let (volume, muted) = (inner.playback.volume, inner.playback.muted);
            inner.playback = PlaybackState::new(volume);
            inner.playback.muted = muted;
        }

        self.backend.pause().await?;
        self.emit(CoreEvent::Queue(QueueEvent::Cleared));
        self.session.clear().await;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }

        self.backend.set_volume(volume).await?;
        let muted = {
            let mut inner = self.inner.lock().await;
            inner.playback.volume = volume;
            inner.playback.muted
        };
        self.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged { volume, muted }));
        Ok(())
    }

    async fn toggle_mute(&self) -> Result<bool> {
        let (muted, volume) = {
            let inner = self.inner.lock().await;
            (!inner.playback.muted, inner.playback.volume)
        };

        self.backend.set_muted(muted).await?;
        self.inner.lock().await.playback.muted = muted;
        self.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged { volume, muted }));
        Ok(muted)
    }

    async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.inner.lock().await.repeat = mode;
        self.emit(CoreEvent::Queue(QueueEvent::RepeatModeChanged {
            mode: mode.as_str().to_string(),
        }));
        Ok(())
    }

    async fn cycle_repeat_mode(&self) -> Result<RepeatMode> {
        let mode = {
            let mut inner = self.inner.lock().await;
            inner.repeat = inner.repeat.next();
            inner.repeat
        };
        self.emit(CoreEvent::Queue(QueueEvent::RepeatModeChanged {
            mode: mode.as_str().to_string(),
        }));
        Ok(mode)
    }

    async fn snapshot(&self) -> PlaybackSnapshot {
        let inner = self.inner.lock().await;
        PlaybackSnapshot {
            status: inner.playback.status(),
            track: inner.queue.current().cloned(),
            index: inner.queue.index(),
            queue_length: inner.queue.len(),
            position: inner.playback.position,
            duration: inner.playback.duration,
            volume: inner.playback.volume,
            muted: inner.playback.muted,
            repeat_mode: inner.repeat,
            shuffle: inner.queue.is_shuffled(),
        }
    }

    async fn queue(&self) -> PlayQueue {
        self.inner.lock().await.queue.clone()
    }

    async fn handle_media_event(&self, event: MediaEvent) -> Result<()> {
        let (before, after, track_id, position, duration) = {
            let mut inner = self.inner.lock().await;
            let before = inner.playback.status();
            inner.playback.apply(&event);
            (
                before,
                inner.playback.status(),
                inner.queue.current().map(|t| t.id),
                inner.playback.position,
                inner.playback.duration,
            )
        };

        match &event {
            MediaEvent::Playing => {
                if let Some(track_id) = track_id {
                    self.emit(CoreEvent::Playback(PlaybackEvent::Started { track_id }));
                }
            }
            MediaEvent::Paused => {
                if let Some(track_id) = track_id {
                    self.emit(CoreEvent::Playback(PlaybackEvent::Paused {
                        track_id,
                        position_ms: millis(position),
                    }));
                }
            }
            MediaEvent::TimeUpdate(_) => {
                self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                    position_ms: millis(position),
                    duration_ms: millis(duration),
                }));
                self.session.position_changed(position, duration).await;
            }
            MediaEvent::VolumeChange { volume, muted } => {
                self.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged {
                    volume: *volume,
                    muted: *muted,
                }));
            }
            MediaEvent::Error(message) => {
                warn!(track_id, error = %message, "Media backend error");
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    track_id,
                    message: message.clone(),
                    recoverable: true,
                }));
            }
            MediaEvent::Ended => {
                if let Some(track_id) = track_id {
                    self.emit(CoreEvent::Playback(PlaybackEvent::Completed { track_id }));
                }
            }
            MediaEvent::LoadStart | MediaEvent::Waiting | MediaEvent::CanPlay | MediaEvent::DurationChange(_) => {}
        }

        if before != after {
            self.session.status_changed(after).await;
        }

        if event == MediaEvent::Ended {
            self.skip_next().await?;
        }
        Ok(())
    }

    async fn handle_session_action(&self, action: MediaSessionAction) -> Result<()> {
        debug!(?action, "Media session action");
        match action {
            MediaSessionAction::Play => {
                let status = self.inner.lock().await.playback.status();
                if status != PlaybackStatus::Playing {
                    self.toggle_play_pause().await?;
                }
                Ok(())
            }
            MediaSessionAction::Pause => Ok(self.backend.pause().await?),
            MediaSessionAction::TogglePlayPause => self.toggle_play_pause().await,
            MediaSessionAction::SeekTo(position) => self.seek_to(position).await,
            MediaSessionAction::SeekBackward(offset) => {
                let position = self.backend.position().await?;
                let target = position.saturating_sub(offset.unwrap_or(DEFAULT_SEEK_STEP));
                self.seek_to(target).await
            }
            MediaSessionAction::SeekForward(offset) => {
                let position = self.backend.position().await?;
                let duration = self.inner.lock().await.playback.duration;
                let mut target = position + offset.unwrap_or(DEFAULT_SEEK_STEP);
                if !duration.is_zero() {
                    target = target.min(duration);
                }
                self.seek_to(target).await
            }
            MediaSessionAction::NextTrack => self.skip_next().await,
            MediaSessionAction::PreviousTrack => self.skip_prev().await,
        }
    }
}
