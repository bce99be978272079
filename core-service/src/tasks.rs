//! Background loops owned by the service.
//!
//! Both loops exit once the shared cancellation token fires.

use bridge_traits::playback::MediaBackend;
use core_api::{CancellationToken, LosslessApi};
use core_playback::{PlaybackEngine, Player};
use core_runtime::events::RecvError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Prune expired API and stream cache entries every `period`.
pub(crate) fn spawn_cache_pruner(
    api: Arc<LosslessApi>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let (api_entries, stream_entries) = api.prune_caches();
                    debug!(api_entries, stream_entries, "Cache prune tick");
                }
            }
        }
        debug!("Cache pruner stopped");
    })
}

/// Forward media backend events to the player.
pub(crate) fn spawn_media_pump(
    backend: Arc<dyn MediaBackend>,
    player: Arc<Player>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut events = backend.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => {
                    if let Err(e) = player.handle_media_event(event).await {
                        warn!(error = %e, "Failed to handle media event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Media event pump lagged");
                }
                Err(RecvError::Closed) => {
                    info!("Media backend closed its event stream");
                    break;
                }
            }
        }
        debug!("Media event pump stopped");
    })
}
