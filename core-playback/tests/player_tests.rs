//! Player behavior against a recording media backend.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::{
    MediaBackend, MediaEvent, MediaSession, MediaSessionAction, MediaSource, NowPlaying,
    PositionState, SessionPlaybackState,
};
use core_library::models::{AudioQuality, Track};
use core_library::store::{LibraryStore, MemoryLibraryStore};
use core_playback::{
    PlaybackEngine, PlaybackError, PlaybackStatus, Player, PlayerConfig, RepeatMode,
    StreamResolver,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use mockall::mock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(String),
    Play,
    Pause,
    Seek(Duration),
    Volume(f32),
    Muted(bool),
}

struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    position: Mutex<Duration>,
    events: broadcast::Sender<MediaEvent>,
}

impl RecordingBackend {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            position: Mutex::new(Duration::ZERO),
            events,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn set_position(&self, position: Duration) {
        *self.position.lock().unwrap() = position;
    }
}

#[async_trait]
impl MediaBackend for RecordingBackend {
    async fn load(&self, source: MediaSource) -> BridgeResult<()> {
        self.record(Call::Load(source.url));
        self.set_position(Duration::ZERO);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(Call::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.record(Call::Seek(position));
        self.set_position(position);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.record(Call::Volume(volume));
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> BridgeResult<()> {
        self.record(Call::Muted(muted));
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock().unwrap())
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

/// Resolves every track to `https://cdn.example/<id>.flac`, except ids in
/// `missing`. The `gated` track waits until released.
#[derive(Default)]
struct TestResolver {
    missing: Vec<i64>,
    gated: Option<(i64, Arc<Notify>, Arc<Notify>)>,
}

#[async_trait]
impl StreamResolver for TestResolver {
    async fn resolve(
        &self,
        track: &Track,
        _quality: AudioQuality,
    ) -> core_playback::Result<Option<MediaSource>> {
        if let Some((id, entered, release)) = &self.gated {
            if *id == track.id {
                entered.notify_one();
                release.notified().await;
            }
        }

        if self.missing.contains(&track.id) {
            return Ok(None);
        }
        Ok(Some(MediaSource::new(url(track.id))))
    }
}

mock! {
    Resolver {}

    #[async_trait]
    impl StreamResolver for Resolver {
        async fn resolve(&self, track: &Track, quality: AudioQuality) -> core_playback::Result<Option<MediaSource>>;
    }
}

mock! {
    Session {}

    #[async_trait]
    impl MediaSession for Session {
        async fn set_metadata(&self, metadata: NowPlaying) -> BridgeResult<()>;
        async fn set_playback_state(&self, state: SessionPlaybackState) -> BridgeResult<()>;
        async fn set_position_state(&self, state: PositionState) -> BridgeResult<()>;
        async fn clear(&self) -> BridgeResult<()>;
    }
}

fn url(id: i64) -> String {
    format!("https://cdn.example/{}.flac", id)
}

fn tracks(ids: &[i64]) -> Vec<Track> {
    ids.iter()
        .map(|id| Track::new(*id, format!("Track {}", id), 240))
        .collect()
}

fn player_with(backend: Arc<RecordingBackend>, resolver: impl StreamResolver + 'static) -> Player {
    Player::new(backend, Arc::new(resolver), PlayerConfig::default())
}

async fn playing_at(ids: &[i64], index: usize) -> (Arc<RecordingBackend>, Player) {
    let backend = RecordingBackend::new();
    let player = player_with(backend.clone(), TestResolver::default());
    let context = tracks(ids);
    player.play_track(context[index].clone(), context).await.unwrap();
    backend.reset();
    (backend, player)
}

// =============================================================================
// play_track
// =============================================================================

#[tokio::test]
async fn test_play_track_from_context() {
    let backend = RecordingBackend::new();
    let library = Arc::new(MemoryLibraryStore::new());
    let player = player_with(backend.clone(), TestResolver::default()).with_library(library.clone());

    let results = tracks(&[10, 11, 12, 13]);
    player.play_track(results[2].clone(), results.clone()).await.unwrap();

    let queue = player.queue().await;
    assert_eq!(queue.tracks(), results.as_slice());
    assert_eq!(queue.index(), Some(2));
    assert_eq!(backend.calls(), vec![Call::Load(url(12)), Call::Play]);

    let recent = library.get_recently_played(10).await.unwrap();
    assert_eq!(recent[0].id, 12);
}

#[tokio::test]
async fn test_play_track_outside_context_goes_first() {
    let backend = RecordingBackend::new();
    let player = player_with(backend.clone(), TestResolver::default());

    let outsider = Track::new(99, "Outsider", 200);
    player.play_track(outsider, tracks(&[1, 2])).await.unwrap();

    let snapshot = player.snapshot().await;
    assert_eq!(snapshot.index, Some(0));
    assert_eq!(snapshot.queue_length, 3);
    assert_eq!(snapshot.track.map(|t| t.id), Some(99));
    assert_eq!(snapshot.status, PlaybackStatus::Paused);
    assert_eq!(backend.loads(), vec![url(99)]);
}

#[tokio::test]
async fn test_unresolvable_track_is_a_no_op() {
    let backend = RecordingBackend::new();
    let resolver = TestResolver {
        missing: vec![5],
        ..TestResolver::default()
    };
    let player = player_with(backend.clone(), resolver);

    let context = tracks(&[5, 6]);
    player.play_track(context[0].clone(), context).await.unwrap();

    assert!(backend.calls().is_empty());
    let queue = player.queue().await;
    assert!(queue.is_empty());
    assert_eq!(queue.index(), None);
}

#[tokio::test]
async fn test_unresolvable_track_keeps_current_position() {
    let backend = RecordingBackend::new();
    let resolver = TestResolver {
        missing: vec![2],
        ..TestResolver::default()
    };
    let player = player_with(backend.clone(), resolver);
    let context = tracks(&[1, 2, 3]);
    player.play_track(context[0].clone(), context).await.unwrap();
    backend.reset();

    player.skip_next().await.unwrap();
    player.play_index(1).await.unwrap();

    assert!(backend.calls().is_empty());
    let snapshot = player.snapshot().await;
    assert_eq!(snapshot.index, Some(0));
    assert_eq!(snapshot.track.map(|t| t.id), Some(1));

    // Still moving on from the track that is actually playing.
    player.play_index(2).await.unwrap();
    assert_eq!(backend.loads(), vec![url(3)]);
    assert_eq!(player.queue().await.index(), Some(2));
}

#[tokio::test]
async fn test_unresolvable_context_keeps_old_queue() {
    let backend = RecordingBackend::new();
    let resolver = TestResolver {
        missing: vec![9],
        ..TestResolver::default()
    };
    let player = player_with(backend.clone(), resolver);
    let context = tracks(&[1, 2]);
    player.play_track(context[1].clone(), context.clone()).await.unwrap();
    backend.reset();

    player
        .play_track(Track::new(9, "Unavailable", 100), tracks(&[8]))
        .await
        .unwrap();

    assert!(backend.calls().is_empty());
    let queue = player.queue().await;
    assert_eq!(queue.tracks(), context.as_slice());
    assert_eq!(queue.index(), Some(1));
}

#[tokio::test]
async fn test_play_index_out_of_range() {
    let (backend, player) = playing_at(&[1, 2], 0).await;
    let err = player.play_index(5).await.unwrap_err();
    assert!(matches!(err, PlaybackError::IndexOutOfRange { index: 5, len: 2 }));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_resolver_error_is_reported() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(1)
        .returning(|track, _| {
            Err(PlaybackError::ResolveFailed {
                track_id: track.id,
                message: "rate limited".to_string(),
            })
        });

    let backend = RecordingBackend::new();
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let player = player_with(backend.clone(), resolver).with_event_bus(bus);

    let context = tracks(&[1]);
    let err = player.play_track(context[0].clone(), context).await.unwrap_err();
    assert!(matches!(err, PlaybackError::ResolveFailed { track_id: 1, .. }));
    assert!(backend.calls().is_empty());

    assert!(player.queue().await.is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Error { track_id: Some(1), recoverable: true, .. })
    ));
}

#[tokio::test]
async fn test_superseded_load_never_reaches_backend() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = RecordingBackend::new();
    let resolver = TestResolver {
        gated: Some((1, entered.clone(), release.clone())),
        ..TestResolver::default()
    };
    let player = Arc::new(player_with(backend.clone(), resolver));
    let context = tracks(&[1, 2]);

    let slow = {
        let player = player.clone();
        let context = context.clone();
        tokio::spawn(async move { player.play_track(context[0].clone(), context).await })
    };

    entered.notified().await;
    player.play_track(context[1].clone(), context.clone()).await.unwrap();
    release.notify_one();
    slow.await.unwrap().unwrap();

    assert_eq!(backend.loads(), vec![url(2)]);
    assert_eq!(player.snapshot().await.track.map(|t| t.id), Some(2));
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_skip_next_and_stop_at_end() {
    let bus = EventBus::new(32);
    let backend = RecordingBackend::new();
    let player = player_with(backend.clone(), TestResolver::default()).with_event_bus(bus.clone());
    let context = tracks(&[1, 2]);
    player.play_track(context[0].clone(), context).await.unwrap();
    backend.reset();

    player.skip_next().await.unwrap();
    assert_eq!(backend.loads(), vec![url(2)]);

    let mut events = bus.subscribe();
    backend.reset();
    player.skip_next().await.unwrap();
    assert_eq!(backend.calls(), vec![Call::Pause, Call::Seek(Duration::ZERO)]);
    assert_eq!(player.queue().await.index(), Some(1));
    assert_eq!(events.recv().await.unwrap(), CoreEvent::Playback(PlaybackEvent::Stopped));
}

#[tokio::test]
async fn test_repeat_all_wraps_to_first() {
    let (backend, player) = playing_at(&[1, 2, 3], 2).await;
    player.set_repeat_mode(RepeatMode::All).await.unwrap();

    player.skip_next().await.unwrap();

    assert_eq!(backend.loads(), vec![url(1)]);
    assert_eq!(player.queue().await.index(), Some(0));
}

#[tokio::test]
async fn test_repeat_one_restarts() {
    let (backend, player) = playing_at(&[1, 2, 3], 1).await;
    player.set_repeat_mode(RepeatMode::One).await.unwrap();

    player.skip_next().await.unwrap();

    assert_eq!(backend.calls(), vec![Call::Seek(Duration::ZERO), Call::Play]);
    assert_eq!(player.queue().await.index(), Some(1));
}

#[tokio::test]
async fn test_skip_prev_past_threshold_restarts() {
    let (backend, player) = playing_at(&[1, 2, 3], 1).await;
    backend.set_position(Duration::from_secs(42));

    player.skip_prev().await.unwrap();

    assert_eq!(backend.calls(), vec![Call::Seek(Duration::ZERO)]);
    assert_eq!(player.queue().await.index(), Some(1));
}

#[tokio::test]
async fn test_skip_prev_within_threshold_goes_back() {
    let (backend, player) = playing_at(&[1, 2, 3], 1).await;
    backend.set_position(Duration::from_secs(2));

    player.skip_prev().await.unwrap();

    assert_eq!(backend.loads(), vec![url(1)]);
    assert_eq!(player.queue().await.index(), Some(0));

    backend.reset();
    player.skip_prev().await.unwrap();
    assert_eq!(backend.calls(), vec![Call::Seek(Duration::ZERO)]);
}

#[tokio::test]
async fn test_track_end_advances_with_events() {
    let bus = EventBus::new(32);
    let backend = RecordingBackend::new();
    let player = player_with(backend.clone(), TestResolver::default()).with_event_bus(bus.clone());
    let context = tracks(&[1, 2]);
    player.play_track(context[0].clone(), context).await.unwrap();
    player.handle_media_event(MediaEvent::Playing).await.unwrap();
    backend.reset();

    let mut events = bus.subscribe();
    player.handle_media_event(MediaEvent::Ended).await.unwrap();

    assert_eq!(backend.loads(), vec![url(2)]);
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Completed { track_id: 1 })
    );
}

#[tokio::test]
async fn test_toggle_play_pause_follows_backend_state() {
    let (backend, player) = playing_at(&[1, 2], 0).await;

    player.handle_media_event(MediaEvent::Playing).await.unwrap();
    player.toggle_play_pause().await.unwrap();
    assert_eq!(backend.calls(), vec![Call::Pause]);

    player.handle_media_event(MediaEvent::Paused).await.unwrap();
    player.toggle_play_pause().await.unwrap();
    assert_eq!(backend.calls(), vec![Call::Pause, Call::Play]);
    assert_eq!(player.queue().await.index(), Some(0));
}

#[tokio::test]
async fn test_toggle_with_empty_queue() {
    let player = player_with(RecordingBackend::new(), TestResolver::default());
    let err = player.toggle_play_pause().await.unwrap_err();
    assert!(matches!(err, PlaybackError::NoTrackLoaded));
}

#[tokio::test]
async fn test_seek_and_volume() {
    let (backend, player) = playing_at(&[1], 0).await;

    player.seek_to(Duration::from_secs(90)).await.unwrap();
    player.set_volume(0.25).await.unwrap();
    assert!(matches!(
        player.set_volume(1.5).await,
        Err(PlaybackError::InvalidVolume(_))
    ));
    assert!(player.toggle_mute().await.unwrap());

    assert_eq!(
        backend.calls(),
        vec![
            Call::Seek(Duration::from_secs(90)),
            Call::Volume(0.25),
            Call::Muted(true)
        ]
    );

    let snapshot = player.snapshot().await;
    assert_eq!(snapshot.volume, 0.25);
    assert!(snapshot.muted);
}

// =============================================================================
// Queue editing
// =============================================================================

#[tokio::test]
async fn test_queue_editing() {
    let (backend, player) = playing_at(&[1, 2, 3], 1).await;

    player.reorder_queue(1, 0).await.unwrap();
    assert_eq!(player.queue().await.index(), Some(0));

    player.add_to_queue(Track::new(4, "d", 100)).await.unwrap();
    player.play_next(Track::new(5, "e", 100)).await.unwrap();
    let ids: Vec<i64> = player.queue().await.tracks().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 5, 1, 3, 4]);

    assert!(matches!(
        player.remove_from_queue(0).await,
        Err(PlaybackError::CannotRemoveCurrent)
    ));
    player.remove_from_queue(2).await.unwrap();
    assert_eq!(player.queue().await.len(), 4);

    // Editing never touches the backend.
    assert!(backend.calls().is_empty());

    player.clear_queue().await.unwrap();
    let snapshot = player.snapshot().await;
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert_eq!(snapshot.index, None);
    assert_eq!(backend.calls(), vec![Call::Pause]);
}

#[tokio::test]
async fn test_shuffle_round_trip() {
    let (_, player) = playing_at(&[1, 2, 3, 4, 5, 6], 3).await;

    assert!(player.toggle_shuffle().await.unwrap());
    let shuffled = player.queue().await;
    assert_eq!(shuffled.index(), Some(0));
    assert_eq!(shuffled.current().map(|t| t.id), Some(4));
    assert!(player.snapshot().await.shuffle);

    assert!(!player.toggle_shuffle().await.unwrap());
    let restored = player.queue().await;
    let ids: Vec<i64> = restored.tracks().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(restored.index(), Some(3));
}

#[tokio::test]
async fn test_cycle_repeat_mode() {
    let player = player_with(RecordingBackend::new(), TestResolver::default());
    assert_eq!(player.cycle_repeat_mode().await.unwrap(), RepeatMode::All);
    assert_eq!(player.cycle_repeat_mode().await.unwrap(), RepeatMode::One);
    assert_eq!(player.cycle_repeat_mode().await.unwrap(), RepeatMode::Off);
}

// =============================================================================
// Media session
// =============================================================================

#[tokio::test]
async fn test_session_receives_metadata_and_state() {
    let mut session = MockSession::new();
    session
        .expect_set_metadata()
        .withf(|meta| meta.title == "Track 7")
        .times(1)
        .returning(|_| Ok(()));
    session
        .expect_set_playback_state()
        .withf(|state| *state == SessionPlaybackState::Playing)
        .times(1)
        .returning(|_| Ok(()));
    session.expect_set_position_state().returning(|_| Ok(()));

    let backend = RecordingBackend::new();
    let player = player_with(backend, TestResolver::default()).with_session(Arc::new(session));

    let context = tracks(&[7]);
    player.play_track(context[0].clone(), context).await.unwrap();
    player.handle_media_event(MediaEvent::Playing).await.unwrap();
}

#[tokio::test]
async fn test_session_actions() {
    let (backend, player) = playing_at(&[1, 2], 0).await;
    backend.set_position(Duration::from_secs(5));

    player
        .handle_session_action(MediaSessionAction::SeekForward(None))
        .await
        .unwrap();
    player
        .handle_session_action(MediaSessionAction::SeekBackward(Some(Duration::from_secs(30))))
        .await
        .unwrap();
    assert_eq!(
        backend.calls(),
        vec![Call::Seek(Duration::from_secs(15)), Call::Seek(Duration::ZERO)]
    );

    backend.reset();
    player
        .handle_session_action(MediaSessionAction::NextTrack)
        .await
        .unwrap();
    assert_eq!(backend.loads(), vec![url(2)]);
}
