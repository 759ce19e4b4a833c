//! Bounded key-value cache with lazy TTL expiry and LRU eviction.
//!
//! Entries are kept in an `IndexMap` ordered from least to most recently
//! used, so eviction pops the front and a hit moves the entry to the back.
//! Expiry is lazy: stale entries are dropped when they are looked up or
//! when `items()` sweeps the map.
//!
//! Not internally synchronized. Owners wrap it in a mutex.

use indexmap::IndexMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    touched: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.touched) > ttl
    }
}

/// A TTL + capacity bounded cache.
pub struct TtlCache<K, V> {
    entries: IndexMap<K, Entry<V>>,
    max_entries: usize,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: IndexMap::new(),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Look up a live entry, refreshing its timestamp and recency.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.entries.get_index_of(key)?;
        let now = Instant::now();

        let expired = self
            .entries
            .get_index(idx)
            .is_some_and(|(_, entry)| entry.is_expired(self.ttl, now));
        if expired {
            self.entries.shift_remove_index(idx);
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        let (_, entry) = self.entries.get_index_mut(last)?;
        entry.touched = now;
        Some(entry.value.clone())
    }

    /// Insert or overwrite, marking the key most recently used.
    pub fn set(&mut self, key: K, value: V) {
        let entry = Entry {
            value,
            touched: Instant::now(),
        };
        // Re-inserting an existing key keeps its slot, so move it explicitly
        let (idx, _) = self.entries.insert_full(key, entry);
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);

        while self.entries.len() > self.max_entries {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Drop expired entries and return the live ones, least recently used first.
    pub fn items(&mut self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let now = Instant::now();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl, now));
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Number of stored entries, including ones that expired but were not swept yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
