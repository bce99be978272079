//! OS media session updates.
//!
//! Session failures never interrupt playback; they are logged and dropped.

use bridge_traits::playback::{
    Artwork, MediaSession, NowPlaying, PositionState, SessionPlaybackState,
};
use core_library::artwork::{cover_url, CoverSize};
use core_library::models::Track;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::state::PlaybackStatus;

/// Artwork renditions for every cover size.
pub fn artwork(cover_id: &str, proxy_base: Option<&str>) -> Vec<Artwork> {
    CoverSize::ALL
        .iter()
        .filter_map(|size| {
            cover_url(cover_id, *size, proxy_base).map(|src| Artwork {
                src,
                sizes: size.dimensions(),
                mime_type: "image/jpeg".to_string(),
            })
        })
        .collect()
}

/// Now-playing metadata for a track.
pub fn now_playing(track: &Track, proxy_base: Option<&str>) -> NowPlaying {
    NowPlaying {
        title: track.full_title(),
        artist: track.artists_display(),
        album: track.album_title().unwrap_or_default().to_string(),
        artwork: track
            .cover_id()
            .map(|id| artwork(id, proxy_base))
            .unwrap_or_default(),
    }
}

impl From<PlaybackStatus> for SessionPlaybackState {
    fn from(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Idle => SessionPlaybackState::None,
            PlaybackStatus::Paused => SessionPlaybackState::Paused,
            PlaybackStatus::Playing | PlaybackStatus::Buffering => SessionPlaybackState::Playing,
        }
    }
}

/// Optional media session handle.
#[derive(Clone)]
pub(crate) struct SessionSync {
    session: Option<Arc<dyn MediaSession>>,
    proxy_base: Option<String>,
}

impl SessionSync {
    pub(crate) fn new(session: Option<Arc<dyn MediaSession>>, proxy_base: Option<String>) -> Self {
        Self {
            session,
            proxy_base,
        }
    }

    pub(crate) fn attach(self, session: Arc<dyn MediaSession>) -> Self {
        Self {
            session: Some(session),
            ..self
        }
    }

    pub(crate) async fn track_changed(&self, track: &Track) {
        if let Some(session) = &self.session {
            let metadata = now_playing(track, self.proxy_base.as_deref());
            if let Err(e) = session.set_metadata(metadata).await {
                debug!(error = %e, "Media session metadata update failed");
            }
        }
    }

    pub(crate) async fn status_changed(&self, status: PlaybackStatus) {
        if let Some(session) = &self.session {
            if let Err(e) = session.set_playback_state(status.into()).await {
                debug!(error = %e, "Media session state update failed");
            }
        }
    }

    pub(crate) async fn position_changed(&self, position: Duration, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        if let Some(session) = &self.session {
            let state = PositionState {
                duration,
                position: position.min(duration),
                playback_rate: 1.0,
            };
            if let Err(e) = session.set_position_state(state).await {
                debug!(error = %e, "Media session position update failed");
            }
        }
    }

    pub(crate) async fn clear(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = session.clear().await {
                debug!(error = %e, "Media session clear failed");
            }
        }
    }
}
