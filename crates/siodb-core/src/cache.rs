//! Bounded LRU cache for loaded catalog objects.
//!
//! The caches live behind their owner's mutex, so the implementation can
//! be a plain map with a recency tick. Eviction drops only the cache's
//! reference; callers that already hold the object keep it alive for the
//! duration of their operation.

use std::collections::HashMap;
use std::hash::Hash;

/// Bounded cache mapping an id to a loaded object.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, (V, u64)>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Creates a cache bounded to `capacity` entries.
    ///
    /// # Panics
    /// Panics when `capacity` is zero; minimum capacities are enforced at
    /// configuration load.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        LruCache {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Looks up an entry, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        if let Some((value, last_used)) = self.entries.get_mut(key) {
            *last_used = tick;
            Some(value.clone())
        } else {
            None
        }
    }

    /// Inserts an entry, evicting the least recently used one when full.
    pub fn emplace(&mut self, key: K, value: V) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(key, (value, self.tick));
    }

    /// Removes an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(value, _)| value)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the cached values, in no particular order.
    pub fn values(&self) -> Vec<V> {
        self.entries.values().map(|(value, _)| value.clone()).collect()
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, last_used))| *last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_emplace() {
        let mut cache = LruCache::new(4);
        cache.emplace(1u64, "one");
        cache.emplace(2, "two");
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&3), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let mut cache = LruCache::new(3);
        cache.emplace(1u64, "one");
        cache.emplace(2, "two");
        cache.emplace(3, "three");

        // Touch 1 so 2 becomes the oldest.
        cache.get(&1);
        cache.emplace(4, "four");

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&1).is_some());
        assert!(cache.get(&2).is_none());
        assert!(cache.get(&3).is_some());
        assert!(cache.get(&4).is_some());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.emplace(1u64, "one");
        cache.emplace(2, "two");
        cache.get(&1);
        cache.emplace(3, "three");
        // 2 was least recently used.
        assert!(cache.get(&2).is_none());
        assert!(cache.get(&1).is_some());
    }

    #[test]
    fn test_reinsert_existing_key_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.emplace(1u64, "one");
        cache.emplace(2, "two");
        cache.emplace(2, "two again");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some("two again"));
        assert!(cache.get(&1).is_some());
    }

    #[test]
    fn test_remove() {
        let mut cache = LruCache::new(2);
        cache.emplace(1u64, "one");
        assert_eq!(cache.remove(&1), Some("one"));
        assert!(cache.get(&1).is_none());
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _cache: LruCache<u64, ()> = LruCache::new(0);
    }
}
