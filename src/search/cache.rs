//! Bounded TTL cache for hybrid search responses.
//!
//! Entries expire after a fixed TTL; when the cache is full the oldest
//! entry is evicted. Expired entries are pruned opportunistically on
//! insert.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Bounded map with per-entry TTL and insertion-order eviction.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_size: usize,
    entries: HashMap<K, (Instant, V)>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Creates a cache with the given TTL and capacity.
    ///
    /// A zero capacity disables caching (every lookup misses).
    #[must_use]
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the cached value if present and unexpired.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let (inserted_at, value) = self.entries.get(key)?;
        (inserted_at.elapsed() < self.ttl).then(|| value.clone())
    }

    /// Inserts a value, evicting expired entries and then the oldest
    /// entry if the cache is over capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }
        self.prune_expired();

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_size {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
            }
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Returns the number of stored entries, including expired ones not
    /// yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (inserted_at, _)| inserted_at.elapsed() < ttl);
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));
    }
}
