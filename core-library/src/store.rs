//! Favorites and recently-played tracks
//!
//! Both lists are keyed by track id. Inserting an existing id replaces the
//! stored track and refreshes its timestamp, so re-playing a track moves it
//! to the front of the recently-played list.

use crate::error::{LibraryError, Result};
use crate::models::Track;
use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default number of recently-played tracks kept.
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

/// Favorites / recently-played persistence.
///
/// Listings are most-recent-first.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Add or refresh a favorite.
    async fn add_favorite(&self, track: &Track) -> Result<()>;

    /// Returns `true` if the track was a favorite.
    async fn remove_favorite(&self, track_id: i64) -> Result<bool>;

    /// Flip the favorite flag. Returns the new state.
    async fn toggle_favorite(&self, track: &Track) -> Result<bool> {
        if self.is_favorite(track.id).await? {
            self.remove_favorite(track.id).await?;
            Ok(false)
        } else {
            self.add_favorite(track).await?;
            Ok(true)
        }
    }

    async fn is_favorite(&self, track_id: i64) -> Result<bool>;

    async fn get_favorites(&self) -> Result<Vec<Track>>;

    async fn add_recently_played(&self, track: &Track) -> Result<()>;

    /// Up to `limit` tracks, newest first.
    async fn get_recently_played(&self, limit: usize) -> Result<Vec<Track>>;

    async fn clear_recently_played(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    track: Track,
    timestamp_ms: i64,
    /// Breaks ties between inserts in the same millisecond.
    seq: u64,
}

#[derive(Default)]
struct Table {
    rows: HashMap<i64, Entry>,
    next_seq: u64,
}

impl Table {
    fn upsert(&mut self, track: &Track, timestamp_ms: i64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(
            track.id,
            Entry {
                track: track.clone(),
                timestamp_ms,
                seq,
            },
        );
    }

    fn newest_first(&self, limit: usize) -> Vec<Track> {
        let mut entries: Vec<&Entry> = self.rows.values().collect();
        entries.sort_by(|a, b| (b.timestamp_ms, b.seq).cmp(&(a.timestamp_ms, a.seq)));
        entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.track.clone())
            .collect()
    }

    /// Drop the oldest rows until at most `capacity` remain.
    fn truncate(&mut self, capacity: usize) {
        while self.rows.len() > capacity {
            let oldest = self
                .rows
                .values()
                .min_by_key(|entry| (entry.timestamp_ms, entry.seq))
                .map(|entry| entry.track.id);
            match oldest {
                Some(id) => {
                    self.rows.remove(&id);
                }
                None => break,
            }
        }
    }
}

/// In-process [`LibraryStore`].
pub struct MemoryLibraryStore {
    clock: Arc<dyn Clock>,
    favorites: Mutex<Table>,
    recent: Mutex<Table>,
    recent_capacity: usize,
}

impl MemoryLibraryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            favorites: Mutex::new(Table::default()),
            recent: Mutex::new(Table::default()),
            recent_capacity: DEFAULT_RECENT_CAPACITY,
        }
    }

    /// Keep at most `capacity` recently-played tracks (minimum 1).
    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity.max(1);
        self
    }

    fn check(track: &Track) -> Result<()> {
        track.validate().map_err(|message| LibraryError::InvalidInput {
            field: "track".to_string(),
            message,
        })
    }
}

impl Default for MemoryLibraryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LibraryStore for MemoryLibraryStore {
    async fn add_favorite(&self, track: &Track) -> Result<()> {
        Self::check(track)?;
        let now = self.clock.unix_timestamp_millis();
        self.favorites.lock().upsert(track, now);
        debug!(track_id = track.id, "Favorite added");
        Ok(())
    }

    async fn remove_favorite(&self, track_id: i64) -> Result<bool> {
        let removed = self.favorites.lock().rows.remove(&track_id).is_some();
        debug!(track_id, removed, "Favorite removed");
        Ok(removed)
    }

    async fn is_favorite(&self, track_id: i64) -> Result<bool> {
        Ok(self.favorites.lock().rows.contains_key(&track_id))
    }

    async fn get_favorites(&self) -> Result<Vec<Track>> {
        Ok(self.favorites.lock().newest_first(usize::MAX))
    }

    async fn add_recently_played(&self, track: &Track) -> Result<()> {
        Self::check(track)?;
        let now = self.clock.unix_timestamp_millis();
        let mut recent = self.recent.lock();
        recent.upsert(track, now);
        recent.truncate(self.recent_capacity);
        Ok(())
    }

    async fn get_recently_played(&self, limit: usize) -> Result<Vec<Track>> {
        Ok(self.recent.lock().newest_first(limit))
    }

    async fn clear_recently_played(&self) -> Result<()> {
        self.recent.lock().rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;
    use std::time::Duration;

    fn track(id: i64) -> Track {
        Track::new(id, format!("Track {}", id), 200)
    }

    fn store() -> (Arc<ManualClock>, MemoryLibraryStore) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryLibraryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_favorites_newest_first() {
        let (clock, store) = store();

        store.add_favorite(&track(1)).await.unwrap();
        clock.advance(Duration::from_secs(1));
        store.add_favorite(&track(2)).await.unwrap();

        let ids: Vec<i64> = store
            .get_favorites()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let (_, store) = store();
        let t = track(9);

        assert!(store.toggle_favorite(&t).await.unwrap());
        assert!(store.is_favorite(9).await.unwrap());
        assert!(!store.toggle_favorite(&t).await.unwrap());
        assert!(!store.is_favorite(9).await.unwrap());
        assert!(!store.remove_favorite(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_replay_moves_track_to_front() {
        let (clock, store) = store();

        for id in 1..=3 {
            store.add_recently_played(&track(id)).await.unwrap();
            clock.advance(Duration::from_millis(10));
        }
        store.add_recently_played(&track(1)).await.unwrap();

        let ids: Vec<i64> = store
            .get_recently_played(10)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_same_millisecond_inserts_keep_insertion_order() {
        let (_, store) = store();

        store.add_recently_played(&track(1)).await.unwrap();
        store.add_recently_played(&track(2)).await.unwrap();

        let recent = store.get_recently_played(1).await.unwrap();
        assert_eq!(recent[0].id, 2);
    }

    #[tokio::test]
    async fn test_recent_capacity_drops_oldest() {
        let (clock, store) = store();
        let store = store.with_recent_capacity(2);

        for id in 1..=3 {
            store.add_recently_played(&track(id)).await.unwrap();
            clock.advance(Duration::from_millis(1));
        }

        let ids: Vec<i64> = store
            .get_recently_played(10)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![3, 2]);

        store.clear_recently_played().await.unwrap();
        assert!(store.get_recently_played(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_track_is_rejected() {
        let (_, store) = store();
        let err = store.add_favorite(&track(0)).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
    }
}
