//! End-to-end tests: mocked HTTP bridge, recording media backend and an
//! in-memory SQLite settings store.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_desktop::SqliteSettingsStore;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{MediaBackend, MediaEvent, MediaSource};
use bridge_traits::storage::SettingsStore;
use core_library::models::AudioQuality;
use core_playback::{PlaybackEngine, PlaybackStatus};
use core_runtime::config::ClientConfig;
use core_runtime::events::{CoreEvent, LibraryEvent};
use core_service::{CoreDependencies, CoreError, CoreService, AUDIO_QUALITY_KEY};
use mockall::mock;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn is_connected(&self) -> bool;
    }
}

struct RecordingBackend {
    loads: Mutex<Vec<String>>,
    events: broadcast::Sender<MediaEvent>,
}

impl RecordingBackend {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            loads: Mutex::new(Vec::new()),
            events,
        })
    }

    fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaBackend for RecordingBackend {
    async fn load(&self, source: MediaSource) -> BridgeResult<()> {
        self.loads.lock().unwrap().push(source.url);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_muted(&self, _muted: bool) -> BridgeResult<()> {
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .instances(["https://api.example"])
        .build()
        .unwrap()
}

fn search_body() -> serde_json::Value {
    json!({
        "data": {
            "limit": 25,
            "offset": 0,
            "totalNumberOfItems": 3,
            "items": [
                { "id": 3135553, "title": "One More Time", "duration": 320 },
                { "id": 3135554, "title": "Aerodynamic", "duration": 207 },
                { "id": 3135555, "title": "Digital Love", "duration": 301 }
            ]
        }
    })
}

fn track_body(id: i64) -> serde_json::Value {
    let manifest = json!({
        "mimeType": "audio/flac",
        "codecs": "flac",
        "urls": [stream_url(id)]
    });
    json!([
        { "id": id, "title": "Track", "duration": 300 },
        {
            "trackId": id,
            "audioQuality": "LOSSLESS",
            "manifestMimeType": "application/vnd.tidal.bts",
            "manifest": STANDARD.encode(manifest.to_string())
        }
    ])
}

fn stream_url(id: i64) -> String {
    format!("https://cdn.example/{}.flac", id)
}

fn track_id(url: &str) -> Option<i64> {
    let (_, rest) = url.split_once("id=")?;
    rest.split('&').next()?.parse().ok()
}

fn catalog_http() -> MockHttpClient {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|request| {
        let body = if request.url.contains("/search/") {
            search_body()
        } else if let Some(id) = request.url.contains("/track/").then(|| track_id(&request.url)).flatten() {
            track_body(id)
        } else {
            return Ok(HttpResponse::new(404, "not found"));
        };
        Ok(HttpResponse::new(200, body.to_string()))
    });
    http
}

async fn service(
    backend: Arc<RecordingBackend>,
    settings: Arc<SqliteSettingsStore>,
) -> CoreService {
    let deps = CoreDependencies::new(backend, settings).with_http_client(Arc::new(catalog_http()));
    CoreService::new(deps, config()).await.unwrap()
}

async fn settings() -> Arc<SqliteSettingsStore> {
    Arc::new(SqliteSettingsStore::in_memory().await.unwrap())
}

#[tokio::test]
async fn test_search_then_play_from_results() {
    let backend = RecordingBackend::new();
    let core = service(backend.clone(), settings().await).await;

    let results = core.search_tracks("daft punk").await.unwrap();
    assert_eq!(results.total_number_of_items, 3);
    assert_eq!(results.items.len(), 3);

    core.play_track(results.items[2].clone(), results.items.clone())
        .await
        .unwrap();

    let queue = core.player().queue().await;
    assert_eq!(queue.tracks(), results.items.as_slice());
    assert_eq!(queue.index(), Some(2));
    assert_eq!(backend.loads(), vec![stream_url(3135555)]);

    let recent = core.recently_played(5).await.unwrap();
    assert_eq!(recent[0].id, 3135555);

    core.shutdown().await;
}

#[tokio::test]
async fn test_missing_http_client() {
    let deps = CoreDependencies::new(RecordingBackend::new(), settings().await);
    let err = CoreService::new(deps, config()).await.err().unwrap();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let deps = CoreDependencies::new(RecordingBackend::new(), settings().await)
        .with_http_client(Arc::new(MockHttpClient::new()));
    let err = CoreService::new(deps, ClientConfig::default()).await.err().unwrap();
    assert!(matches!(err, CoreError::Runtime(_)));
}

#[tokio::test]
async fn test_audio_quality_is_persisted() {
    let store = settings().await;

    let core = service(RecordingBackend::new(), store.clone()).await;
    assert_eq!(core.audio_quality().await, AudioQuality::Lossless);
    core.set_audio_quality(AudioQuality::HiResLossless).await.unwrap();
    core.shutdown().await;

    assert_eq!(
        store.get_string(AUDIO_QUALITY_KEY).await.unwrap().as_deref(),
        Some("HI_RES_LOSSLESS")
    );

    let reopened = service(RecordingBackend::new(), store).await;
    assert_eq!(reopened.audio_quality().await, AudioQuality::HiResLossless);
    reopened.shutdown().await;
}

#[tokio::test]
async fn test_unknown_stored_quality_falls_back() {
    let store = settings().await;
    store.set_string(AUDIO_QUALITY_KEY, "ULTRA").await.unwrap();

    let core = service(RecordingBackend::new(), store).await;
    assert_eq!(core.audio_quality().await, AudioQuality::Lossless);
    core.shutdown().await;
}

#[tokio::test]
async fn test_background_playback_setting() {
    let core = service(RecordingBackend::new(), settings().await).await;

    assert!(!core.background_playback().await.unwrap());
    core.set_background_playback(true).await.unwrap();
    assert!(core.background_playback().await.unwrap());

    core.shutdown().await;
}

#[tokio::test]
async fn test_toggle_favorite_emits_events() {
    let core = service(RecordingBackend::new(), settings().await).await;
    let mut events = core.subscribe();
    let track = core_library::models::Track::new(7, "Veridis Quo", 345);

    assert!(core.toggle_favorite(&track).await.unwrap());
    assert!(core.is_favorite(7).await.unwrap());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::FavoriteAdded { track_id: 7 })
    );

    assert!(!core.toggle_favorite(&track).await.unwrap());
    assert!(core.favorites().await.unwrap().is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::FavoriteRemoved { track_id: 7 })
    );

    core.shutdown().await;
}

#[tokio::test]
async fn test_media_events_reach_the_player() {
    let backend = RecordingBackend::new();
    let core = service(backend.clone(), settings().await).await;

    let results = core.search_tracks("daft punk").await.unwrap();
    core.play_track(results.items[0].clone(), results.items.clone())
        .await
        .unwrap();

    backend.events.send(MediaEvent::Playing).unwrap();

    let player = core.player();
    tokio::time::timeout(Duration::from_secs(1), async {
        while player.snapshot().await.status != PlaybackStatus::Playing {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    core.shutdown().await;
}
