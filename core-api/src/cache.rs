//! Response caches
//!
//! [`ApiCache`] keeps API results per [`CacheKind`], each kind in its own
//! bounded bucket. Entries expire at an absolute time taken from the injected
//! [`Clock`]; reads check expiry lazily. Eviction is by insertion order:
//! buckets are `LruCache`s that are only ever read with `peek`, so the
//! "least recently used" entry is always the oldest inserted one.
//!
//! [`StreamUrlCache`] holds resolved stream URLs. It grows freely between
//! prunes and is trimmed back to its cap, oldest first, by
//! [`StreamUrlCache::prune`].

use bridge_traits::time::Clock;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Category of a cached API result. Each kind has its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheKind {
    SearchTracks,
    SearchArtists,
    SearchAlbums,
    SearchPlaylists,
    Album,
    Artist,
    Playlist,
    Track,
    Lyrics,
}

impl CacheKind {
    pub const ALL: [CacheKind; 9] = [
        CacheKind::SearchTracks,
        CacheKind::SearchArtists,
        CacheKind::SearchAlbums,
        CacheKind::SearchPlaylists,
        CacheKind::Album,
        CacheKind::Artist,
        CacheKind::Playlist,
        CacheKind::Track,
        CacheKind::Lyrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::SearchTracks => "search_tracks",
            CacheKind::SearchArtists => "search_artists",
            CacheKind::SearchAlbums => "search_albums",
            CacheKind::SearchPlaylists => "search_playlists",
            CacheKind::Album => "album",
            CacheKind::Artist => "artist",
            CacheKind::Playlist => "playlist",
            CacheKind::Track => "track",
            CacheKind::Lyrics => "lyrics",
        }
    }
}

/// Snapshot of cache occupancy and effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Live and not-yet-pruned entries per kind
    pub entries: BTreeMap<CacheKind, usize>,
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries currently held by the stream URL cache
    pub stream_urls: usize,
}

impl CacheStats {
    /// Hits over lookups, as a percentage. 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        (self.hits as f64 / lookups as f64) * 100.0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: i64,
}

struct CacheInner<V> {
    buckets: HashMap<CacheKind, LruCache<String, CacheEntry<V>>>,
    hits: u64,
    misses: u64,
}

/// TTL cache bounded per kind.
pub struct ApiCache<V> {
    inner: Mutex<CacheInner<V>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_size: NonZeroUsize,
}

impl<V: Clone> ApiCache<V> {
    /// `max_size` of zero is treated as one.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                buckets: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            clock,
            ttl,
            max_size: NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `(kind, id)`. A stale entry is dropped and reported
    /// as a miss.
    pub fn get(&self, kind: CacheKind, id: &str) -> Option<V> {
        let now = self.clock.unix_timestamp_millis();
        let mut inner = self.inner.lock();

        let lookup = inner
            .buckets
            .get_mut(&kind)
            .and_then(|bucket| match bucket.peek(id) {
                Some(entry) if now < entry.expires_at_ms => Some(Some(entry.value.clone())),
                Some(_) => {
                    bucket.pop(id);
                    Some(None)
                }
                None => None,
            });

        match lookup {
            Some(Some(value)) => {
                inner.hits += 1;
                trace!(kind = kind.as_str(), id, "Cache hit");
                Some(value)
            }
            Some(None) => {
                inner.misses += 1;
                trace!(kind = kind.as_str(), id, "Cache entry expired");
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a value. Updating an existing key keeps its place in the
    /// eviction order; a new key past `max_size` evicts the oldest insert.
    pub fn set(&self, kind: CacheKind, id: impl Into<String>, value: V) {
        let id = id.into();
        let entry = CacheEntry {
            value,
            expires_at_ms: self.expiry_from_now(),
        };

        let max_size = self.max_size;
        let mut inner = self.inner.lock();
        let bucket = inner
            .buckets
            .entry(kind)
            .or_insert_with(|| LruCache::new(max_size));

        if let Some(existing) = bucket.peek_mut(&id) {
            *existing = entry;
            return;
        }

        if let Some((evicted, _)) = bucket.push(id, entry) {
            debug!(kind = kind.as_str(), evicted = %evicted, "Cache bucket full, evicted oldest");
        }
    }

    pub fn remove(&self, kind: CacheKind, id: &str) -> Option<V> {
        self.inner
            .lock()
            .buckets
            .get_mut(&kind)
            .and_then(|bucket| bucket.pop(id))
            .map(|entry| entry.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.unix_timestamp_millis();
        let mut inner = self.inner.lock();
        let mut removed = 0;

        for bucket in inner.buckets.values_mut() {
            let stale: Vec<String> = bucket
                .iter()
                .filter(|(_, entry)| now >= entry.expires_at_ms)
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                bucket.pop(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Pruned expired cache entries");
        }
        removed
    }

    /// Drop everything, counters included.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.buckets.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn len(&self, kind: CacheKind) -> usize {
        self.inner
            .lock()
            .buckets
            .get(&kind)
            .map_or(0, |bucket| bucket.len())
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let entries: BTreeMap<CacheKind, usize> = CacheKind::ALL
            .iter()
            .map(|kind| (*kind, inner.buckets.get(kind).map_or(0, |b| b.len())))
            .collect();
        let total_entries = entries.values().sum();

        CacheStats {
            entries,
            total_entries,
            hits: inner.hits,
            misses: inner.misses,
            stream_urls: 0,
        }
    }

    fn expiry_from_now(&self) -> i64 {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        self.clock.unix_timestamp_millis().saturating_add(ttl_ms)
    }
}

/// Resolved stream URLs keyed by `<track_id>:<quality>`.
pub struct StreamUrlCache {
    entries: Mutex<LruCache<String, String>>,
    max_entries: usize,
}

impl StreamUrlCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn key(track_id: i64, quality: &str) -> String {
        format!("{}:{}", track_id, quality)
    }

    pub fn get(&self, track_id: i64, quality: &str) -> Option<String> {
        self.entries
            .lock()
            .peek(&Self::key(track_id, quality))
            .cloned()
    }

    pub fn insert(&self, track_id: i64, quality: &str, url: impl Into<String>) {
        let key = Self::key(track_id, quality);
        let url = url.into();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.peek_mut(&key) {
            *existing = url;
        } else {
            entries.push(key, url);
        }
    }

    /// Trim to the cap, oldest first. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock();
        let mut removed = 0;
        while entries.len() > self.max_entries {
            if entries.pop_lru().is_none() {
                break;
            }
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "Pruned stream URL cache");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;

    fn cache(max_size: usize) -> (Arc<ManualClock>, ApiCache<String>) {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = ApiCache::new(clock.clone(), Duration::from_secs(60), max_size);
        (clock, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_, cache) = cache(10);
        cache.set(CacheKind::Album, "42", "Discovery".to_string());

        assert_eq!(cache.get(CacheKind::Album, "42"), Some("Discovery".to_string()));
        assert_eq!(cache.get(CacheKind::Artist, "42"), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (clock, cache) = cache(10);
        cache.set(CacheKind::Track, "1", "a".to_string());

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(CacheKind::Track, "1").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(CacheKind::Track, "1").is_none());
        assert_eq!(cache.len(CacheKind::Track), 0);
    }

    #[test]
    fn test_oldest_inserted_is_evicted_even_after_reads() {
        let (_, cache) = cache(2);
        cache.set(CacheKind::SearchTracks, "a", "1".to_string());
        cache.set(CacheKind::SearchTracks, "b", "2".to_string());

        // Reads never promote.
        assert!(cache.get(CacheKind::SearchTracks, "a").is_some());

        cache.set(CacheKind::SearchTracks, "c", "3".to_string());
        assert!(cache.get(CacheKind::SearchTracks, "a").is_none());
        assert!(cache.get(CacheKind::SearchTracks, "b").is_some());
        assert!(cache.get(CacheKind::SearchTracks, "c").is_some());
    }

    #[test]
    fn test_update_keeps_insertion_position() {
        let (_, cache) = cache(2);
        cache.set(CacheKind::Album, "a", "1".to_string());
        cache.set(CacheKind::Album, "b", "2".to_string());
        cache.set(CacheKind::Album, "a", "1b".to_string());
        cache.set(CacheKind::Album, "c", "3".to_string());

        assert!(cache.get(CacheKind::Album, "a").is_none());
        assert_eq!(cache.get(CacheKind::Album, "b"), Some("2".to_string()));
    }

    #[test]
    fn test_buckets_are_independent() {
        let (_, cache) = cache(1);
        cache.set(CacheKind::Album, "1", "album".to_string());
        cache.set(CacheKind::Artist, "1", "artist".to_string());

        assert_eq!(cache.get(CacheKind::Album, "1"), Some("album".to_string()));
        assert_eq!(cache.get(CacheKind::Artist, "1"), Some("artist".to_string()));
    }

    #[test]
    fn test_clear_expired_and_stats() {
        let (clock, cache) = cache(10);
        cache.set(CacheKind::Album, "old", "x".to_string());
        clock.advance(Duration::from_secs(30));
        cache.set(CacheKind::Album, "new", "y".to_string());
        clock.advance(Duration::from_secs(31));

        assert_eq!(cache.clear_expired(), 1);
        assert!(cache.get(CacheKind::Album, "new").is_some());
        assert!(cache.get(CacheKind::Album, "old").is_none());

        let stats = cache.stats();
        assert_eq!(stats.entries[&CacheKind::Album], 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats {
            entries: CacheKind::ALL.iter().map(|k| (*k, 0)).collect(),
            ..CacheStats::default()
        });
    }

    #[test]
    fn test_stream_cache_prunes_oldest_first() {
        let cache = StreamUrlCache::new(2);
        cache.insert(1, "LOSSLESS", "https://cdn/1");
        cache.insert(2, "LOSSLESS", "https://cdn/2");
        cache.insert(3, "LOSSLESS", "https://cdn/3");

        // Over the cap until the next prune.
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.get(1, "LOSSLESS"), None);
        assert_eq!(cache.get(3, "LOSSLESS"), Some("https://cdn/3".to_string()));
    }

    #[test]
    fn test_stream_cache_key_includes_quality() {
        let cache = StreamUrlCache::new(10);
        cache.insert(7, "HIGH", "https://cdn/high");
        assert_eq!(cache.get(7, "LOSSLESS"), None);
        assert_eq!(StreamUrlCache::key(7, "HIGH"), "7:HIGH");
    }
}
