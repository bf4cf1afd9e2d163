//! WaveCache: LRU memoization of expensive search results.
//!
//! Entries live in a slab threaded by an intrusive doubly linked list
//! (head = most recently used, tail = least). The hash map points from the
//! canonical key to the slab slot, so lookup, promotion and eviction are all
//! O(1). Once the slab is full an eviction hands its slot straight to the
//! incoming entry, so the slab never grows past `max_size`.
//!
//! Memoized computations must be pure functions of the key; nothing here can
//! detect a caller that violates that.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveError};
use crate::key::CacheKey;
use crate::time::now_unix_secs_f64;

/// A memoized value plus its bookkeeping.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub key_hash: u64,
    pub value: V,
    /// Unix seconds of the last put or hit.
    pub timestamp: f64,
    pub hit_count: u64,
    pub compute_time_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: u64,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    /// Sum of the original compute time of every entry served from cache.
    pub time_saved_ms: f64,
}

struct Slot<C, V> {
    canonical: C,
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct WaveCache<K: CacheKey + ?Sized, V> {
    max_size: usize,
    slots: Vec<Slot<K::Canonical, V>>,
    index: HashMap<K::Canonical, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
    time_saved_ms: f64,
    _key: PhantomData<fn(&K)>,
}

impl<K: CacheKey + ?Sized, V> WaveCache<K, V> {
    pub fn new(max_size: u64) -> Result<Self> {
        if max_size == 0 {
            return Err(WaveError::InvalidCapacity(
                "cache max_size must be positive".to_string(),
            ));
        }
        let max_size = usize::try_from(max_size).map_err(|_| {
            WaveError::InvalidCapacity(format!("cache max_size {max_size} exceeds address space"))
        })?;
        Ok(Self {
            max_size,
            slots: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            hits: 0,
            misses: 0,
            evictions: 0,
            time_saved_ms: 0.0,
            _key: PhantomData,
        })
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let Some(&slot) = self.index.get(&key.canonical()) else {
            self.misses += 1;
            return None;
        };
        self.hits += 1;
        self.move_to_front(slot);
        let entry = &mut self.slots[slot].entry;
        entry.hit_count += 1;
        entry.timestamp = now_unix_secs_f64();
        self.time_saved_ms += entry.compute_time_ms;
        Some(&entry.value)
    }

    /// Read without touching recency or stats.
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.index
            .get(&key.canonical())
            .map(|&slot| &self.slots[slot].entry)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(&key.canonical())
    }

    /// Store `value` under `key`. Replaces in place if present, otherwise
    /// evicts the least recently used entry when full.
    pub fn put(&mut self, value: V, compute_time_ms: f64, key: &K) {
        let canonical = key.canonical();
        let entry = CacheEntry {
            key_hash: key.key_hash(),
            value,
            timestamp: now_unix_secs_f64(),
            hit_count: 0,
            compute_time_ms,
        };

        if let Some(&slot) = self.index.get(&canonical) {
            self.slots[slot].entry = entry;
            self.move_to_front(slot);
            return;
        }

        let slot = match self.tail {
            // Full: recycle the tail slot.
            Some(lru) if self.slots.len() >= self.max_size => {
                self.unlink(lru);
                let old = std::mem::replace(
                    &mut self.slots[lru],
                    Slot {
                        canonical: canonical.clone(),
                        entry,
                        prev: None,
                        next: None,
                    },
                );
                self.index.remove(&old.canonical);
                self.evictions += 1;
                tracing::trace!(key_hash = old.entry.key_hash, "evicted lru cache entry");
                lru
            }
            _ => {
                self.slots.push(Slot {
                    canonical: canonical.clone(),
                    entry,
                    prev: None,
                    next: None,
                });
                self.slots.len() - 1
            }
        };

        self.index.insert(canonical, slot);
        self.push_front(slot);
    }

    /// Drop every entry. Hit/miss counters survive.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len() as u64,
            max_size: self.max_size as u64,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate: self.hit_rate(),
            time_saved_ms: self.time_saved_ms,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.slots[slot].prev = None;
        self.slots[slot].next = self.head;
        if let Some(h) = self.head {
            self.slots[h].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point4;
    use proptest::prelude::*;

    #[test]
    fn test_lru_eviction_order() {
        let mut cache: WaveCache<str, i32> = WaveCache::new(2).unwrap();
        cache.put(1, 0.0, "a");
        cache.put(2, 0.0, "b");
        assert_eq!(cache.get("a"), Some(&1));
        cache.put(3, 0.0, "c");

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.get("c"), Some(&3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_put_existing_replaces_and_promotes() {
        let mut cache: WaveCache<str, i32> = WaveCache::new(2).unwrap();
        cache.put(1, 0.0, "a");
        cache.put(2, 0.0, "b");
        cache.put(10, 0.0, "a");
        cache.put(3, 0.0, "c");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(&10));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache: WaveCache<u64, &str> = WaveCache::new(1).unwrap();
        cache.put("x", 0.0, &1);
        cache.put("y", 0.0, &2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"y"));
    }

    #[test]
    fn test_refill_after_clear_recycles_slots() {
        let mut cache: WaveCache<u64, u64> = WaveCache::new(3).unwrap();
        for i in 0..3u64 {
            cache.put(i, 0.0, &i);
        }
        cache.clear();
        for i in 10..15u64 {
            cache.put(i, 0.0, &i);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 2);
        assert!(!cache.contains(&10));
        assert!(!cache.contains(&11));
        assert_eq!(cache.get(&14), Some(&14));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            WaveCache::<str, i32>::new(0),
            Err(WaveError::InvalidCapacity(_))
        ));
    }

    #[test]
    fn test_stats_track_hits_and_time_saved() {
        let mut cache: WaveCache<str, i32> = WaveCache::new(4).unwrap();
        cache.put(1, 12.5, "slow");
        assert!(cache.get("slow").is_some());
        assert!(cache.get("slow").is_some());
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats.time_saved_ms - 25.0).abs() < 1e-12);
        assert_eq!(cache.peek("slow").map(|e| e.hit_count), Some(2));
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache: WaveCache<str, i32> = WaveCache::new(2).unwrap();
        cache.put(1, 0.0, "a");
        cache.put(2, 0.0, "b");
        assert!(cache.peek("a").is_some());
        cache.put(3, 0.0, "c");
        assert!(!cache.contains("a"), "peek must not refresh recency");
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_point_keys_canonicalize_signed_zero() {
        let mut cache: WaveCache<(Point4, usize), Vec<u32>> = WaveCache::new(8).unwrap();
        cache.put(vec![7], 1.0, &(Point4::new(0.0, 1.0, 2.0, 3.0), 5));
        let hit = cache.get(&(Point4::new(-0.0, 1.0, 2.0, 3.0), 5));
        assert_eq!(hit, Some(&vec![7]));
        assert!(cache.get(&(Point4::new(0.0, 1.0, 2.0, 3.0), 6)).is_none());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut cache: WaveCache<str, i32> = WaveCache::new(3).unwrap();
        cache.put(1, 0.0, "a");
        let _ = cache.get("a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
        cache.put(2, 0.0, "b");
        assert_eq!(cache.get("b"), Some(&2));
    }

    #[test]
    fn test_long_run_never_exceeds_capacity() {
        let mut cache: WaveCache<u64, u64> = WaveCache::new(16).unwrap();
        for i in 0..1000u64 {
            cache.put(i * 2, 0.0, &i);
            if i % 3 == 0 {
                let _ = cache.get(&(i / 2));
            }
            assert!(cache.len() <= 16);
        }
        // The newest 16 keys were inserted last and must all be present.
        for i in 984..1000u64 {
            assert!(cache.contains(&i), "recent key {i} missing");
        }
    }

    proptest! {
        #[test]
        fn prop_put_then_get_roundtrip(
            key in "[a-z]{1,8}",
            value in any::<i64>(),
            ms in 0.0f64..1000.0,
        ) {
            let mut cache: WaveCache<str, i64> = WaveCache::new(4).unwrap();
            cache.put(value, ms, key.as_str());
            prop_assert_eq!(cache.get(key.as_str()), Some(&value));
        }
    }
}
