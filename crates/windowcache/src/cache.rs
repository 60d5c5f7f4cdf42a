//! Window cache: keyed entries tagged with their originating page,
//! purged by page distance.
//!
//! Eviction is not LRU. Every entry remembers the page it was written
//! for, and a write landing further than `pages_to_retain` pages from the
//! last settled page drops everything outside that distance of the new
//! page. One far jump immediately bounds memory to the pages around it.

use std::collections::HashMap;
use std::hash::Hash;

use ahash::RandomState;

use crate::atomic::Atomic;
use crate::stats::CacheStats;

/// Default page-distance retention threshold
pub const DEFAULT_PAGES_TO_RETAIN: u64 = 5;

struct Entry<V> {
    value: V,
    page: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>, RandomState>,
    /// Most recently settled page: updated only when a write lands more
    /// than `pages_to_retain` pages away from the previous value.
    last_referenced_page: u64,
}

/// Cache mapping keys to values tagged with their originating page
pub struct WindowCache<K, V> {
    inner: Atomic<Inner<K, V>>,
    pages_to_retain: u64,
    stats: CacheStats,
}

impl<K, V> WindowCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create a cache retaining entries within `pages_to_retain` pages of
    /// the last settled page
    pub fn new(pages_to_retain: u64) -> Self {
        Self {
            inner: Atomic::new(Inner {
                entries: HashMap::with_hasher(RandomState::new()),
                last_referenced_page: 0,
            }),
            pages_to_retain,
            stats: CacheStats::new(),
        }
    }

    /// Get the cached value for a key, if resident
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self
            .inner
            .mutate(|inner| inner.entries.get(key).map(|e| e.value.clone()));

        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Insert or overwrite the entry for a key, tagged with the page it
    /// was fetched for
    ///
    /// If `page` is further than `pages_to_retain` from the last settled
    /// page, every entry further than `pages_to_retain` from `page` is
    /// purged and `page` becomes the new settled page. Purge and insert
    /// run under one atomic mutation, so no reader observes a half-purged
    /// map.
    pub fn put(&self, key: K, value: V, page: u64) {
        let retain = self.pages_to_retain;

        self.inner.mutate(|inner| {
            if page.abs_diff(inner.last_referenced_page) > retain {
                let before = inner.entries.len();
                inner.entries.retain(|_, e| e.page.abs_diff(page) <= retain);
                self.stats.record_purged((before - inner.entries.len()) as u64);
                inner.last_referenced_page = page;
            }
            inner.entries.insert(key, Entry { value, page });
        });

        self.stats.record_insert();
    }

    /// Remove the entry for a key (invalidation)
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner
            .mutate(|inner| inner.entries.remove(key).map(|e| e.value))
    }

    /// Get the current number of resident entries
    pub fn len(&self) -> usize {
        self.inner.mutate(|inner| inner.entries.len())
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.mutate(|inner| inner.entries.is_empty())
    }

    /// Drop every entry (the settled page is kept)
    pub fn clear(&self) {
        self.inner.mutate(|inner| inner.entries.clear());
    }

    /// Get the most recently settled page
    pub fn last_referenced_page(&self) -> u64 {
        self.inner.mutate(|inner| inner.last_referenced_page)
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K, V> Default for WindowCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_PAGES_TO_RETAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(2, "b", 0);

        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&2), Some("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(1, "b", 0);

        assert_eq!(cache.get(&1), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_remove() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);

        assert_eq!(cache.remove(&1), Some("a"));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.remove(&1), None);
    }

    #[test]
    fn test_near_writes_do_not_settle() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(2, "b", 3);

        // |3 - 0| <= 3, nothing purged, settled page unchanged
        assert_eq!(cache.last_referenced_page(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_far_write_purges_and_settles() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(2, "b", 1);
        cache.put(3, "c", 9);

        // |9 - 0| > 3: pages 0 and 1 are dropped, 9 settles
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some("c"));
        assert_eq!(cache.last_referenced_page(), 9);
    }

    #[test]
    fn test_purge_measures_distance_to_target_page() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(2, "b", 4); // within 3 of the jump target below
        cache.put(3, "c", 7);

        // |7 - 0| > 3 triggers a purge; page 4 survives because
        // |4 - 7| <= 3, page 0 does not
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("b"));
        assert_eq!(cache.get(&3), Some("c"));
        assert_eq!(cache.last_referenced_page(), 7);
    }

    #[test]
    fn test_backward_jump_purges() {
        let cache = WindowCache::new(2);

        cache.put(1, "a", 9);
        cache.put(2, "b", 20);
        cache.put(3, "c", 5);

        // settled page went 0 -> 9 -> 20; |5 - 20| > 2 purges page 20,
        // and page 9 is also outside |9 - 5| <= 2
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some("c"));
        assert_eq!(cache.last_referenced_page(), 5);
    }

    #[test]
    fn test_cache_clear() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.put(2, "b", 0);
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_stats() {
        let cache = WindowCache::new(3);

        cache.put(1, "a", 0);
        cache.get(&1); // hit
        cache.get(&1); // hit
        cache.get(&2); // miss

        assert_eq!(cache.stats().hits(), 2);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().inserts(), 1);
        assert_eq!(cache.stats().hit_ratio(), 2.0 / 3.0);
    }

    #[test]
    fn test_purged_count() {
        let cache = WindowCache::new(1);

        cache.put(1, "a", 0);
        cache.put(2, "b", 0);
        cache.put(3, "c", 10);

        assert_eq!(cache.stats().purged(), 2);
        assert_eq!(cache.len(), 1);
    }
}
