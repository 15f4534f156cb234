//! Bounded Container Module
//!
//! Memory-budgeted local cache tier combining HashMap storage with LRU
//! eviction and byte-accurate size accounting.

use std::collections::HashMap;

use serde_json::Value;

use crate::cache::{CacheStats, LruTracker};

// == Cache Entry ==
/// A single entry in the bounded container: the decoded value and the byte
/// size it was charged at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub value: Value,
    /// Size in bytes charged against the memory budget
    pub size: usize,
}

// == Memory Cache ==
/// Memory-bounded LRU container, the local tier of the cache.
///
/// Invariant: after every public call returns, `current_size` equals the sum
/// of live entry sizes and does not exceed `max_size`. The container may go
/// over budget only transiently inside `set` while the eviction loop runs.
#[derive(Debug)]
pub struct MemoryCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Recency tracker driving eviction order
    lru: LruTracker,
    /// Performance counters
    stats: CacheStats,
    /// Memory budget in bytes
    max_size: usize,
    /// Sum of live entry sizes
    current_size: usize,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates a new container with the given memory budget in bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_size,
            current_size: 0,
        }
    }

    // == Set ==
    /// Inserts or replaces an entry and marks it most recently used.
    ///
    /// When the insert pushes `current_size` over the budget, least recently
    /// used entries are evicted one at a time until the container fits. The
    /// fresh entry is MRU, so it is evicted last: an entry larger than the
    /// whole budget is admitted, evicts everything else, and finally evicts
    /// itself, leaving the container empty rather than over budget.
    pub fn set(&mut self, key: String, value: Value, size: usize) {
        if let Some(old) = self.entries.remove(&key) {
            self.debit(old.size);
            self.lru.remove(&key);
        }

        self.current_size += size;
        self.entries.insert(key.clone(), CacheEntry { value, size });
        self.lru.touch(&key);

        while self.current_size > self.max_size {
            let Some(victim) = self.lru.pop_lru() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.debit(entry.size);
                self.stats.record_eviction();
            }
        }
    }

    // == Get ==
    /// Looks up a value and marks the entry most recently used.
    ///
    /// `None` is the miss sentinel; a stored JSON `null` comes back as
    /// `Some(Value::Null)` and still counts as a hit.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match self.entries.get(key) {
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Checks for a key without touching recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry and debits its size; no-op when the key is absent.
    pub fn delete(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.debit(entry.size);
            self.lru.remove(key);
        }
    }

    // == Clear ==
    /// Empties the container. Counters are left untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.current_size = 0;
    }

    // == Keys ==
    /// Returns the currently held keys in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Memory ==
    /// Returns the sum of live entry sizes in bytes.
    pub fn get_memory(&self) -> usize {
        self.current_size
    }

    // == Stats ==
    /// Returns a snapshot of the cumulative counters.
    pub fn get_stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Zeroes the counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subtracts from `current_size`, failing fast on accounting underflow.
    fn debit(&mut self, size: usize) {
        assert!(
            self.current_size >= size,
            "memory accounting underflow: current {} < debit {}",
            self.current_size,
            size
        );
        self.current_size -= size;
    }
}
