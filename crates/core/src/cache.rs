//! Bounded, TTL-expiring result cache keyed by canonical URL.
//!
//! One entry per canonical URL; the URL transformer is the only source of
//! key aliasing. Entries are stored with `cached: false` and handed back
//! with `cached: true`, so the stored copy stays in its canonical
//! non-cached form. A single mutex guards the map, which keeps reads and
//! writes of one key linearizable across concurrent requests.

use crate::types::{CacheStats, ExtractionResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    result: ExtractionResult,
    inserted_at: Instant,
    last_used: u64,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

/// In-memory extraction result cache with TTL expiry and LRU eviction.
///
/// Capacity and TTL are required positive values; configuration validation
/// enforces that before a cache is ever constructed.
pub struct ExtractCache {
    inner: Mutex<Inner>,
    max_size: usize,
    ttl: Duration,
}

impl ExtractCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        debug_assert!(max_size > 0, "cache capacity must be positive");
        debug_assert!(!ttl.is_zero(), "cache TTL must be positive");
        Self { inner: Mutex::new(Inner { entries: HashMap::new(), tick: 0 }), max_size, ttl }
    }

    /// Look up a canonical URL.
    ///
    /// Returns a copy with `cached` forced to `true`. Entries older than
    /// the TTL are treated as absent and dropped on the spot. A hit
    /// refreshes the entry's recency.
    pub fn get(&self, key: &str) -> Option<ExtractionResult> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;

        let mut result = entry.result.clone();
        result.cached = true;
        Some(result)
    }

    /// Store a result under a canonical URL, with `cached` forced to
    /// `false` and a fresh insertion timestamp.
    ///
    /// Overwrites any previous entry for the key. When capacity is
    /// exceeded, the least-recently-used entry is evicted.
    pub fn set(&self, key: &str, result: &ExtractionResult) {
        let mut stored = result.clone();
        stored.cached = false;

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key.to_string(),
            CacheEntry { result: stored, inserted_at: Instant::now(), last_used: tick },
        );

        if inner.entries.len() > self.max_size {
            // Capacity is at most a few thousand entries; a linear scan
            // finds the coldest one.
            let coldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(coldest) = coldest {
                tracing::debug!(key = %coldest, "evicting least-recently-used cache entry");
                inner.entries.remove(&coldest);
            }
        }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { size: self.len(), max_size: self.max_size, ttl: self.ttl }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Engine;

    fn sample(title: &str) -> ExtractionResult {
        ExtractionResult {
            title: title.to_string(),
            text: "body text".to_string(),
            engine: Engine::GenericMarkup,
            score: 85.0,
            cached: false,
            render_ms: None,
        }
    }

    #[test]
    fn test_round_trip_sets_cached_flag() {
        let cache = ExtractCache::new(10, Duration::from_secs(60));
        let result = sample("a");
        cache.set("https://example.com/a", &result);

        let hit = cache.get("https://example.com/a").unwrap();
        assert!(hit.cached);
        assert_eq!(hit.title, result.title);
        assert_eq!(hit.text, result.text);
        assert_eq!(hit.engine, result.engine);
        assert_eq!(hit.score, result.score);
    }

    #[test]
    fn test_stored_copy_is_never_marked_cached() {
        let cache = ExtractCache::new(10, Duration::from_secs(60));
        let mut result = sample("a");
        result.cached = true;
        cache.set("k", &result);

        // First and second reads both see cached: true, derived from a
        // stored cached: false original.
        assert!(cache.get("k").unwrap().cached);
        assert!(cache.get("k").unwrap().cached);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = ExtractCache::new(10, Duration::from_secs(60));
        assert!(cache.get("absent").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ExtractCache::new(10, Duration::from_millis(30));
        cache.set("k", &sample("a"));
        assert!(cache.get("k").is_some());

        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get("k").is_none());
        // The expired entry was physically dropped too.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = ExtractCache::new(3, Duration::from_secs(60));
        for i in 0..10 {
            cache.set(&format!("key{i}"), &sample("a"));
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn test_evicts_least_recently_used_first() {
        let cache = ExtractCache::new(2, Duration::from_secs(60));
        cache.set("first", &sample("1"));
        cache.set("second", &sample("2"));

        // Touch "first" so "second" becomes the coldest entry.
        assert!(cache.get("first").is_some());
        cache.set("third", &sample("3"));

        assert!(cache.get("first").is_some());
        assert!(cache.get("second").is_none());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_overwrite_refreshes_entry() {
        let cache = ExtractCache::new(10, Duration::from_millis(40));
        cache.set("k", &sample("old"));
        std::thread::sleep(Duration::from_millis(25));
        cache.set("k", &sample("new"));
        std::thread::sleep(Duration::from_millis(25));

        // 50ms after the first insert but only 25ms after the overwrite.
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.title, "new");
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = ExtractCache::new(5, Duration::from_secs(60));
        cache.set("a", &sample("a"));
        cache.set("b", &sample("b"));

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.max_size, 5);
        assert_eq!(stats.ttl, Duration::from_secs(60));

        cache.clear();
        assert!(cache.is_empty());
    }
}
