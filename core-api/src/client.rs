//! Lossless API client
//!
//! Talks to an ordered list of mirror instances of the catalog API.
//!
//! # Failover
//!
//! Each instance gets up to `max_attempts` tries with linear backoff between
//! them, then the next instance is tried:
//!
//! | Response                         | Action                           |
//! |----------------------------------|----------------------------------|
//! | 2xx                              | decode and return                |
//! | 429                              | `RateLimited`, stop              |
//! | 401 with `subStatus == 11002`    | retry                            |
//! | 5xx, transport error             | retry                            |
//! | any other status                 | `Http { status }`, stop          |
//!
//! When every instance is exhausted the last error is returned. A cancelled
//! [`RequestOptions::cancel`] token ends the request with
//! [`ApiError::Aborted`], including while waiting out a backoff.
//!
//! # Caching
//!
//! Results are cached per query in an [`ApiCache`]; resolved stream URLs go
//! to a separate [`StreamUrlCache`]. [`LosslessApi::prune_caches`] is meant
//! to be called periodically by the owner.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::{Clock, SystemClock};
use core_library::artwork::{cover_url, CoverSize};
use core_library::models::{
    Album, AlbumWithTracks, Artist, ArtistDetails, AudioQuality, Playlist, PlaylistWithTracks,
    SearchResponse, Track,
};
use core_runtime::config::ClientConfig;
use core_runtime::events::{ApiEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ApiCache, CacheKind, CacheStats, StreamUrlCache};
use crate::error::{ApiError, Result};
use crate::lyrics::{parse_lyrics_response, Lyrics};
use crate::manifest::decode_manifest;
use crate::normalize::{normalize_list, normalize_search};
use crate::quality::{prepare_album, prepare_track};

/// Upstream sub-status for an expired anonymous token; the mirror refreshes
/// it on its own, so the request is worth repeating.
const SUB_STATUS_TOKEN_REFRESH: i64 = 11002;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Cancelling this token aborts the request.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

/// Playback info entry of a track response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    #[serde(default)]
    pub track_id: Option<i64>,
    #[serde(default)]
    pub audio_quality: Option<String>,
    /// Base64 manifest
    pub manifest: String,
    #[serde(default)]
    pub manifest_mime_type: Option<String>,
    #[serde(default)]
    pub bit_depth: Option<u32>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

/// Everything `/track/` returns for one id and quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackLookup {
    pub track: Track,
    pub info: Option<StreamInfo>,
    /// Direct file URL some mirrors return instead of a manifest
    pub original_track_url: Option<String>,
}

enum Attempt {
    Done(Value),
    Retry(ApiError),
    Fail(ApiError),
}

/// Client for the lossless catalog API.
pub struct LosslessApi {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
    retry: RetryPolicy,
    cache: ApiCache<Value>,
    stream_cache: StreamUrlCache,
    events: Option<EventBus>,
}

impl LosslessApi {
    /// Create a client using the system clock.
    ///
    /// The configuration is expected to be validated already (see
    /// [`ClientConfig::validate`]).
    pub fn new(http: Arc<dyn HttpClient>, config: ClientConfig) -> Self {
        Self::with_clock(http, config, Arc::new(SystemClock))
    }

    pub fn with_clock(http: Arc<dyn HttpClient>, config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = ApiCache::new(clock, config.cache_ttl, config.cache_max_size);
        let stream_cache = StreamUrlCache::new(config.stream_cache_max_entries);
        let retry = config.retry_policy();

        Self {
            http,
            config,
            retry,
            cache,
            stream_cache,
            events: None,
        }
    }

    /// Override the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish failover and pruning events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub async fn search_tracks(&self, query: &str, options: &RequestOptions) -> Result<SearchResponse<Track>> {
        let page: SearchResponse<Track> = self
            .search(CacheKind::SearchTracks, "s", "tracks", query, options)
            .await?;
        Ok(page.map(prepare_track))
    }

    pub async fn search_artists(&self, query: &str, options: &RequestOptions) -> Result<SearchResponse<Artist>> {
        self.search(CacheKind::SearchArtists, "a", "artists", query, options)
            .await
    }

    pub async fn search_albums(&self, query: &str, options: &RequestOptions) -> Result<SearchResponse<Album>> {
        let page: SearchResponse<Album> = self
            .search(CacheKind::SearchAlbums, "al", "albums", query, options)
            .await?;
        Ok(page.map(prepare_album))
    }

    pub async fn search_playlists(&self, query: &str, options: &RequestOptions) -> Result<SearchResponse<Playlist>> {
        self.search(CacheKind::SearchPlaylists, "p", "playlists", query, options)
            .await
    }

    #[instrument(skip(self, options), fields(kind = kind.as_str()))]
    async fn search<T>(
        &self,
        kind: CacheKind,
        param: &str,
        section: &str,
        query: &str,
        options: &RequestOptions,
    ) -> Result<SearchResponse<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        let key = query.trim().to_lowercase();
        if key.is_empty() {
            return Ok(SearchResponse::empty());
        }

        if let Some(hit) = self.cached(kind, &key) {
            return Ok(hit);
        }

        let path = format!("/search/?{}={}", param, urlencoding::encode(query.trim()));
        let value = self.fetch_json(&path, options).await?;
        let page: SearchResponse<T> = normalize_search(&value, Some(section));

        debug!(total = page.total_number_of_items, returned = page.len(), "Search completed");
        self.store(kind, &key, &page);
        Ok(page)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn get_album(&self, id: i64) -> Result<AlbumWithTracks> {
        let key = id.to_string();
        if let Some(hit) = self.cached(CacheKind::Album, &key) {
            return Ok(hit);
        }

        let value = self
            .fetch_json(&format!("/album/?id={}", id), &RequestOptions::default())
            .await?;

        let album_value = find_entity(&value, "album", |v| {
            v.get("title").is_some() && v.get("items").is_none()
        })
        .ok_or_else(|| ApiError::Decode(format!("Album {} missing from response", id)))?;
        let album = prepare_album(serde_json::from_value(album_value.clone())?);

        let tracks = normalize_list::<Track>(&value, Some("tracks"))
            .into_iter()
            .map(prepare_track)
            .collect();

        let result = AlbumWithTracks { album, tracks };
        self.store(CacheKind::Album, &key, &result);
        Ok(result)
    }

    pub async fn get_album_tracks(&self, id: i64) -> Result<Vec<Track>> {
        Ok(self.get_album(id).await?.tracks)
    }

    #[instrument(skip(self))]
    pub async fn get_artist(&self, id: i64) -> Result<ArtistDetails> {
        let key = id.to_string();
        if let Some(hit) = self.cached(CacheKind::Artist, &key) {
            return Ok(hit);
        }

        let value = self
            .fetch_json(&format!("/artist/?id={}", id), &RequestOptions::default())
            .await?;

        let artist_value = find_entity(&value, "artist", |v| {
            v.get("name").is_some() && v.get("items").is_none()
        })
        .ok_or_else(|| ApiError::Decode(format!("Artist {} missing from response", id)))?;
        let artist: Artist = serde_json::from_value(artist_value.clone())?;

        let tracks = keyed(&value, "tracks")
            .map(|section| normalize_list::<Track>(section, None))
            .unwrap_or_default()
            .into_iter()
            .map(prepare_track)
            .collect();
        let albums = keyed(&value, "albums")
            .map(|section| normalize_list::<Album>(section, None))
            .unwrap_or_default()
            .into_iter()
            .map(prepare_album)
            .collect();

        let result = ArtistDetails {
            artist,
            tracks,
            albums,
        };
        self.store(CacheKind::Artist, &key, &result);
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn get_playlist(&self, uuid: &str) -> Result<PlaylistWithTracks> {
        if let Some(hit) = self.cached(CacheKind::Playlist, uuid) {
            return Ok(hit);
        }

        let value = self
            .fetch_json(
                &format!("/playlist/?id={}", urlencoding::encode(uuid)),
                &RequestOptions::default(),
            )
            .await?;

        let playlist_value = find_entity(&value, "playlist", |v| {
            v.get("uuid").is_some() && v.get("items").is_none()
        })
        .ok_or_else(|| ApiError::Decode(format!("Playlist {} missing from response", uuid)))?;
        let playlist: Playlist = serde_json::from_value(playlist_value.clone())?;

        let tracks = normalize_list::<Track>(&value, Some("tracks"))
            .into_iter()
            .map(prepare_track)
            .collect();

        let result = PlaylistWithTracks { playlist, tracks };
        self.store(CacheKind::Playlist, uuid, &result);
        Ok(result)
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Fetch a track and its playback info at `quality`.
    ///
    /// The response is a list of untyped entries: the one with `duration` is
    /// the track, the one with `manifest` is the playback info, and an
    /// `OriginalTrackUrl` entry, when present, makes the info optional.
    #[instrument(skip(self), fields(quality = quality.as_str()))]
    pub async fn get_track(&self, id: i64, quality: AudioQuality) -> Result<TrackLookup> {
        let key = StreamUrlCache::key(id, quality.as_str());
        if let Some(hit) = self.cached(CacheKind::Track, &key) {
            return Ok(hit);
        }

        let value = self
            .fetch_json(
                &format!("/track/?id={}&quality={}", id, quality.as_str()),
                &RequestOptions::default(),
            )
            .await?;

        let entries: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let track_value = entries
            .iter()
            .find(|entry| entry.get("duration").is_some())
            .ok_or_else(|| ApiError::MalformedTrackResponse {
                missing: "track".to_string(),
            })?;
        let track = prepare_track(serde_json::from_value((*track_value).clone())?);

        let original_track_url = entries
            .iter()
            .find_map(|entry| entry.get("OriginalTrackUrl"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let info = match entries.iter().find(|entry| entry.get("manifest").is_some()) {
            Some(entry) => Some(serde_json::from_value::<StreamInfo>((*entry).clone())?),
            None if original_track_url.is_some() => None,
            None => {
                return Err(ApiError::MalformedTrackResponse {
                    missing: "info".to_string(),
                })
            }
        };

        let result = TrackLookup {
            track,
            info,
            original_track_url,
        };
        self.store(CacheKind::Track, &key, &result);
        Ok(result)
    }

    /// Resolve a playable URL for the track at `quality`.
    #[instrument(skip(self), fields(quality = quality.as_str()))]
    pub async fn get_stream_url(&self, track_id: i64, quality: AudioQuality) -> Result<String> {
        if let Some(url) = self.stream_cache.get(track_id, quality.as_str()) {
            debug!("Stream URL cache hit");
            return Ok(url);
        }

        let lookup = self.get_track(track_id, quality).await?;

        let url = match lookup.original_track_url {
            Some(url) => url,
            None => lookup
                .info
                .as_ref()
                .and_then(|info| decode_manifest(&info.manifest, info.manifest_mime_type.as_deref()))
                .map(|decoded| decoded.url)
                .ok_or(ApiError::StreamUrlNotFound { track_id })?,
        };

        debug!(url = %redact_url(&url), "Stream URL resolved");
        self.stream_cache.insert(track_id, quality.as_str(), url.clone());
        Ok(url)
    }

    /// Cover art URL for an image id, honoring the configured proxy.
    pub fn get_cover_url(&self, image_id: &str, size: CoverSize) -> Option<String> {
        cover_url(image_id, size, self.config.cover_proxy_base.as_deref())
    }

    /// Lyrics for a track. `Ok(None)` when the track has none.
    #[instrument(skip(self, track), fields(track_id = track.id))]
    pub async fn fetch_lyrics(&self, track: &Track) -> Result<Option<Lyrics>> {
        let key = track.id.to_string();
        if let Some(hit) = self.cached::<Lyrics>(CacheKind::Lyrics, &key) {
            return Ok(Some(hit));
        }

        let value = match self
            .fetch_json(&format!("/lyrics/?id={}", track.id), &RequestOptions::default())
            .await
        {
            Ok(value) => value,
            Err(ApiError::Http { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let lyrics = parse_lyrics_response(&value, track.id);
        if let Some(lyrics) = &lyrics {
            self.store(CacheKind::Lyrics, &key, lyrics);
        }
        Ok(lyrics)
    }

    // =========================================================================
    // Cache maintenance
    // =========================================================================

    pub fn clear_cache(&self) {
        self.cache.clear();
        self.stream_cache.clear();
        info!("API caches cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            stream_urls: self.stream_cache.len(),
            ..self.cache.stats()
        }
    }

    /// Drop expired API entries and trim the stream URL cache to its cap.
    /// Returns `(api_entries, stream_entries)` removed.
    pub fn prune_caches(&self) -> (usize, usize) {
        let api_entries = self.cache.clear_expired();
        let stream_entries = self.stream_cache.prune();

        if api_entries + stream_entries > 0 {
            debug!(api_entries, stream_entries, "Caches pruned");
            self.emit(ApiEvent::CachePruned {
                api_entries,
                stream_entries,
            });
        }
        (api_entries, stream_entries)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// GET `path` against the instances in order and decode the JSON body.
    async fn fetch_json(&self, path: &str, options: &RequestOptions) -> Result<Value> {
        if self.config.instances.is_empty() {
            return Err(ApiError::NoInstances);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for instance in &self.config.instances {
            let url = format!("{}{}", instance, path);

            for attempt in 1..=max_attempts {
                if options.is_cancelled() {
                    return Err(ApiError::Aborted);
                }

                match self.attempt(instance, &url, options).await? {
                    Attempt::Done(value) => return Ok(value),
                    Attempt::Fail(err) => return Err(err),
                    Attempt::Retry(err) => {
                        debug!(instance = %instance, attempt, error = %loggable(&err), "Request failed, retrying");
                        last_error = Some(err);
                        if attempt < max_attempts {
                            let delay = self.retry.delay_for(attempt);
                            if !delay.is_zero() {
                                cancellable(options, tokio::time::sleep(delay)).await?;
                            }
                        }
                    }
                }
            }

            let message = last_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(instance = %instance, error = %redact_url(&message), "Instance exhausted, trying next");
            self.emit(ApiEvent::InstanceFailed {
                instance: instance.clone(),
                message,
            });
        }

        Err(last_error.unwrap_or(ApiError::NoInstances))
    }

    /// One round trip. The outer `Err` is only ever `Aborted`.
    async fn attempt(&self, instance: &str, url: &str, options: &RequestOptions) -> Result<Attempt> {
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout);

        let response = match cancellable(options, self.http.execute(request)).await? {
            Ok(response) => response,
            Err(err) => return Ok(Attempt::Retry(ApiError::from(err))),
        };

        Ok(self.classify(instance, url, response))
    }

    fn classify(&self, instance: &str, url: &str, response: HttpResponse) -> Attempt {
        let status = response.status;
        let http_error = || ApiError::Http {
            status,
            url: url.to_string(),
        };

        match status {
            200..=299 => match serde_json::from_slice::<Value>(&response.body) {
                Ok(value) => Attempt::Done(value),
                Err(e) => Attempt::Fail(ApiError::from(e)),
            },
            429 => {
                warn!(instance = %instance, "Rate limited");
                self.emit(ApiEvent::RateLimited {
                    instance: instance.to_string(),
                });
                Attempt::Fail(ApiError::RateLimited {
                    instance: instance.to_string(),
                })
            }
            401 if sub_status(&response) == Some(SUB_STATUS_TOKEN_REFRESH) => {
                Attempt::Retry(http_error())
            }
            500..=599 => Attempt::Retry(http_error()),
            _ => Attempt::Fail(http_error()),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Cached value decoded as `T`. A value of another shape counts as a miss.
    fn cached<T: DeserializeOwned>(&self, kind: CacheKind, key: &str) -> Option<T> {
        self.cache
            .get(kind, key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn store<T: Serialize>(&self, kind: CacheKind, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.set(kind, key, value),
            Err(e) => warn!(kind = kind.as_str(), error = %e, "Failed to cache result"),
        }
    }

    fn emit(&self, event: ApiEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Api(event));
        }
    }
}

/// Run `future` unless the caller's token fires first.
async fn cancellable<F: Future>(options: &RequestOptions, future: F) -> Result<F::Output> {
    match &options.cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ApiError::Aborted),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}

fn sub_status(response: &HttpResponse) -> Option<i64> {
    serde_json::from_slice::<Value>(&response.body)
        .ok()?
        .get("subStatus")
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

/// Error text for log lines; request URLs lose their query string.
fn loggable(err: &ApiError) -> String {
    redact_url(&err.to_string())
}

/// The entity object of a detail response: the `key` field, the first array
/// element matching `is_entity`, or the response itself.
fn find_entity<'a>(value: &'a Value, key: &str, is_entity: impl Fn(&Value) -> bool) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.iter().find_map(|item| match item.get(key) {
            Some(inner) if inner.is_object() => Some(inner),
            _ => is_entity(item).then_some(item),
        }),
        Value::Object(_) => match value.get(key) {
            Some(inner) if inner.is_object() => Some(inner),
            _ => is_entity(value).then_some(value),
        },
        _ => None,
    }
}

/// Field `key` of the response object, or of the first array element
/// carrying it.
fn keyed<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.iter().find_map(|item| item.get(key)),
        other => other.get(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sub_status_parsing() {
        let numeric = HttpResponse::new(401, r#"{"status":401,"subStatus":11002}"#);
        assert_eq!(sub_status(&numeric), Some(11002));

        let text = HttpResponse::new(401, r#"{"subStatus":"11002"}"#);
        assert_eq!(sub_status(&text), Some(11002));

        assert_eq!(sub_status(&HttpResponse::new(401, "Unauthorized")), None);
    }

    #[test]
    fn test_logged_errors_hide_query_strings() {
        let err = ApiError::Http {
            status: 503,
            url: "https://a.example/track/?id=1&quality=LOSSLESS".to_string(),
        };
        assert_eq!(loggable(&err), "HTTP 503 from https://a.example/track/?[REDACTED]");
        assert_eq!(loggable(&ApiError::Aborted), "Request aborted");
    }

    #[test]
    fn test_find_entity_shapes() {
        let is_album = |v: &Value| v.get("title").is_some() && v.get("items").is_none();

        let array = json!([{ "id": 1, "title": "Discovery" }, { "items": [] }]);
        assert_eq!(find_entity(&array, "album", is_album).unwrap()["id"], 1);

        let nested = json!({ "album": { "id": 2, "title": "Homework" }, "items": [] });
        assert_eq!(find_entity(&nested, "album", is_album).unwrap()["id"], 2);

        let flat = json!({ "id": 3, "title": "Random Access Memories" });
        assert_eq!(find_entity(&flat, "album", is_album).unwrap()["id"], 3);

        assert!(find_entity(&json!({ "items": [] }), "album", is_album).is_none());
    }

    #[test]
    fn test_keyed_lookup() {
        let value = json!([{ "name": "Daft Punk" }, { "tracks": { "items": [] } }]);
        assert!(keyed(&value, "tracks").is_some());
        assert!(keyed(&value, "albums").is_none());
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let options = RequestOptions::with_cancel(token);

        let result = cancellable(&options, async { 42 }).await;
        assert!(matches!(result, Err(ApiError::Aborted)));

        let result = cancellable(&RequestOptions::default(), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
