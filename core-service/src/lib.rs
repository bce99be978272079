//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, media
//! backend, media session, settings) into the lossless API client, the
//! player and the library store. Desktop apps typically enable the
//! `desktop-shims` feature, which builds the HTTP client and settings store
//! from `bridge-desktop`; other hosts assemble [`CoreDependencies`] by hand.
//!
//! ```ignore
//! let deps = CoreDependencies::new(backend, settings).with_http_client(http);
//! let core = CoreService::new(deps, config).await?;
//!
//! let results = core.search_tracks("daft punk").await?;
//! core.play_track(results.items[2].clone(), results.items.clone()).await?;
//! ```

pub mod error;
pub mod resolver;
mod tasks;

pub use error::{CoreError, Result};
pub use resolver::ApiStreamResolver;

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    playback::{MediaBackend, MediaSession},
    storage::SettingsStore,
};
use core_api::{CancellationToken, LosslessApi, RequestOptions};
use core_library::models::{AudioQuality, SearchResponse, Track};
use core_library::store::{LibraryStore, MemoryLibraryStore};
use core_playback::{PlaybackEngine, Player, PlayerConfig};
use core_runtime::config::ClientConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, Receiver};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};

/// Settings key holding the preferred quality token.
pub const AUDIO_QUALITY_KEY: &str = "audio_quality";

/// Settings key holding the background playback flag.
pub const BG_PLAYBACK_KEY: &str = "bg_playback";

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub media_backend: Arc<dyn MediaBackend>,
    pub media_session: Option<Arc<dyn MediaSession>>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub library: Option<Arc<dyn LibraryStore>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from the handles every host provides.
    pub fn new(media_backend: Arc<dyn MediaBackend>, settings_store: Arc<dyn SettingsStore>) -> Self {
        Self {
            http_client: None,
            media_backend,
            media_session: None,
            settings_store,
            library: None,
        }
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_media_session(mut self, session: Arc<dyn MediaSession>) -> Self {
        self.media_session = Some(session);
        self
    }

    /// Use a persistent library store instead of the in-memory default.
    pub fn with_library(mut self, library: Arc<dyn LibraryStore>) -> Self {
        self.library = Some(library);
        self
    }
}

/// Primary façade exposed to host applications.
pub struct CoreService {
    api: Arc<LosslessApi>,
    player: Arc<Player>,
    library: Arc<dyn LibraryStore>,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CoreService {
    /// Build the service and start its background tasks.
    ///
    /// Fails with [`CoreError::CapabilityMissing`] when no HTTP client was
    /// provided, and with a configuration error when `config` is invalid.
    /// Must be called inside a tokio runtime.
    pub async fn new(deps: CoreDependencies, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = deps.http_client.ok_or_else(|| CoreError::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "The lossless API client needs an HTTP bridge".to_string(),
        })?;

        let events = EventBus::default();
        let library = deps
            .library
            .unwrap_or_else(|| Arc::new(MemoryLibraryStore::new()));

        let quality = stored_quality(deps.settings_store.as_ref(), &config).await;
        let player_config = PlayerConfig::from_client(&config).with_quality(quality);
        let prune_interval = config.prune_interval;

        let api = Arc::new(LosslessApi::new(http, config).with_event_bus(events.clone()));
        let resolver = Arc::new(ApiStreamResolver::new(api.clone()));

        let mut player = Player::new(deps.media_backend.clone(), resolver, player_config)
            .with_library(library.clone())
            .with_event_bus(events.clone());
        if let Some(session) = deps.media_session {
            player = player.with_session(session);
        }
        let player = Arc::new(player);

        let shutdown = CancellationToken::new();
        let tasks = vec![
            tasks::spawn_cache_pruner(api.clone(), prune_interval, shutdown.clone()),
            tasks::spawn_media_pump(deps.media_backend, player.clone(), shutdown.clone()),
        ];

        info!(quality = quality.as_str(), "Core service started");

        Ok(Self {
            api,
            player,
            library,
            settings: deps.settings_store,
            events,
            shutdown,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn api(&self) -> Arc<LosslessApi> {
        Arc::clone(&self.api)
    }

    pub fn player(&self) -> Arc<Player> {
        Arc::clone(&self.player)
    }

    pub fn library(&self) -> Arc<dyn LibraryStore> {
        Arc::clone(&self.library)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Search tracks with the default request options.
    pub async fn search_tracks(&self, query: &str) -> Result<SearchResponse<Track>> {
        Ok(self.api.search_tracks(query, &RequestOptions::default()).await?)
    }

    /// Play `track` with `context` as the new queue.
    pub async fn play_track(&self, track: Track, context: Vec<Track>) -> Result<()> {
        Ok(self.player.play_track(track, context).await?)
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub async fn audio_quality(&self) -> AudioQuality {
        self.player.quality().await
    }

    /// Persist the preferred quality and use it for subsequent loads.
    pub async fn set_audio_quality(&self, quality: AudioQuality) -> Result<()> {
        self.settings
            .set_string(AUDIO_QUALITY_KEY, quality.as_str())
            .await?;
        self.player.set_quality(quality).await;
        info!(quality = quality.as_str(), "Audio quality changed");
        Ok(())
    }

    /// Whether playback should continue while the host is in the background.
    /// Defaults to `false`.
    pub async fn background_playback(&self) -> Result<bool> {
        Ok(self
            .settings
            .get_bool(BG_PLAYBACK_KEY)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_background_playback(&self, enabled: bool) -> Result<()> {
        self.settings.set_bool(BG_PLAYBACK_KEY, enabled).await?;
        Ok(())
    }

    // =========================================================================
    // Library
    // =========================================================================

    /// Toggle a favorite. Returns `true` if the track is now a favorite.
    pub async fn toggle_favorite(&self, track: &Track) -> Result<bool> {
        let added = self.library.toggle_favorite(track).await?;
        let event = if added {
            LibraryEvent::FavoriteAdded { track_id: track.id }
        } else {
            LibraryEvent::FavoriteRemoved { track_id: track.id }
        };
        let _ = self.events.emit(CoreEvent::Library(event));
        Ok(added)
    }

    pub async fn is_favorite(&self, track_id: i64) -> Result<bool> {
        Ok(self.library.is_favorite(track_id).await?)
    }

    pub async fn favorites(&self) -> Result<Vec<Track>> {
        Ok(self.library.get_favorites().await?)
    }

    pub async fn recently_played(&self, limit: usize) -> Result<Vec<Track>> {
        Ok(self.library.get_recently_played(limit).await?)
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Core service stopped");
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Stored quality preference, falling back to the configured one.
async fn stored_quality(settings: &dyn SettingsStore, config: &ClientConfig) -> AudioQuality {
    let fallback = AudioQuality::from_token(&config.preferred_quality).unwrap_or_default();
    match settings.get_string(AUDIO_QUALITY_KEY).await {
        Ok(Some(token)) => AudioQuality::from_token(&token).unwrap_or_else(|| {
            warn!(token = %token, "Ignoring unknown stored audio quality");
            fallback
        }),
        Ok(None) => fallback,
        Err(e) => {
            warn!(error = %e, "Failed to read audio quality setting");
            fallback
        }
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses `reqwest` for HTTP with the configured request timeout and the
/// SQLite settings store in the platform data directory.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    media_backend: Arc<dyn MediaBackend>,
    config: ClientConfig,
) -> Result<CoreService> {
    let http = ReqwestHttpClient::with_timeout(config.request_timeout)
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let settings = SqliteSettingsStore::open_default()
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let deps = CoreDependencies::new(media_backend, Arc::new(settings)).with_http_client(Arc::new(http));
    CoreService::new(deps, config).await
}
