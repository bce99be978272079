//! Stream resolution through the lossless API.

use async_trait::async_trait;
use bridge_traits::playback::MediaSource;
use core_api::{ApiError, LosslessApi};
use core_library::models::{AudioQuality, Track};
use core_playback::{PlaybackError, StreamResolver};
use std::sync::Arc;
use tracing::debug;

/// [`StreamResolver`] backed by [`LosslessApi::get_stream_url`].
///
/// A track without any playable URL resolves to `None`; every other API
/// failure is reported as [`PlaybackError::ResolveFailed`].
pub struct ApiStreamResolver {
    api: Arc<LosslessApi>,
}

impl ApiStreamResolver {
    pub fn new(api: Arc<LosslessApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StreamResolver for ApiStreamResolver {
    async fn resolve(
        &self,
        track: &Track,
        quality: AudioQuality,
    ) -> core_playback::Result<Option<MediaSource>> {
        match self.api.get_stream_url(track.id, quality).await {
            Ok(url) => Ok(Some(MediaSource::new(url))),
            Err(ApiError::StreamUrlNotFound { track_id }) => {
                debug!(track_id, "Track has no stream URL");
                Ok(None)
            }
            Err(e) => Err(PlaybackError::ResolveFailed {
                track_id: track.id,
                message: e.to_string(),
            }),
        }
    }
}
