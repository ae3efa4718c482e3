// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A capacity-bounded, recency-ordered cache.
//!
//! Grounded on the original's `cxxtools::LruCache`/`Cache`: a `BTreeMap`
//! keyed by the user's key, each entry stamped with a monotonically
//! increasing `serial`; `get` on a hit re-stamps the entry with a fresh
//! serial (promoting it to most-recently-used); insertion past capacity
//! evicts whichever entry carries the lowest serial.

use std::collections::BTreeMap;

struct Entry<V> {
    serial: u64,
    value: V,
}

/// An LRU cache with `O(log n)` get/put, tracking hit/miss counts the same
/// way the original's `LruCache` does for diagnostics.
pub struct LruCache<K, V> {
    capacity: usize,
    next_serial: u64,
    hits: u64,
    misses: u64,
    entries: BTreeMap<K, Entry<V>>,
}

impl<K: Ord + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LruCache capacity must be nonzero");
        Self {
            capacity,
            next_serial: 0,
            hits: 0,
            misses: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn bump_serial(&mut self) -> u64 {
        let s = self.next_serial;
        self.next_serial += 1;
        s
    }

    /// Insert or overwrite `key`, evicting the least-recently-touched entry
    /// if the cache is already at capacity and `key` is new.
    pub fn put(&mut self, key: K, value: V) {
        let serial = self.bump_serial();
        if self.entries.contains_key(&key) {
            self.entries.insert(key, Entry { serial, value });
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, Entry { serial, value });
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.serial)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let serial = self.bump_serial();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.serial = serial;
                self.hits += 1;
                Some(&entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_most_recently_touched_survive_overflow() {
        let mut cache: LruCache<i32, i32> = LruCache::new(6);
        for k in 1..=10 {
            cache.put(k, k * 10);
        }
        assert_eq!(cache.len(), 6);
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.get(&8), Some(&80));
    }

    #[test]
    fn get_hit_promotes_recency_so_it_survives_a_later_eviction() {
        let mut cache: LruCache<i32, i32> = LruCache::new(3);
        cache.put(1, 10);
        cache.put(2, 20);
        cache.put(3, 30);
        // Touch key 1 so it becomes the most recent.
        assert_eq!(cache.get(&1), Some(&10));
        cache.put(4, 40); // should evict 2, the now-oldest.
        assert!(cache.peek(&2).is_none());
        assert!(cache.peek(&1).is_some());
    }

    #[test]
    fn hit_and_miss_counters_track_lookups() {
        let mut cache: LruCache<i32, i32> = LruCache::new(2);
        cache.put(1, 1);
        let _ = cache.get(&1);
        let _ = cache.get(&2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }
}
