//! Session Tier Module
//!
//! Byte-budgeted, LRU-evicted storage owned by a single consumer session.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, CacheStats, LruTracker};

/// Result of offering an entry to a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Stored, after evicting the listed keys to make room
    Stored { evicted: Vec<CacheKey> },
    /// Larger than the tier's whole budget; not stored
    Skipped,
}

impl Placement {
    pub fn is_stored(&self) -> bool {
        matches!(self, Placement::Stored { .. })
    }
}

// == Session Tier ==
/// Session-scoped entries evicted least-recently-used first.
#[derive(Debug)]
pub struct SessionTier {
    entries: HashMap<CacheKey, CacheEntry>,
    lru: LruTracker,
    bytes: usize,
    budget: usize,
    stats: CacheStats,
}

impl SessionTier {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            bytes: 0,
            budget: budget_bytes,
            stats: CacheStats::new(budget_bytes),
        }
    }

    // == Get ==
    /// Returns a copy of the entry and records the access.
    pub fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.lru.touch(key);
                self.stats.record_hit();
                Some(entry.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Reads an entry without counting an access.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores an entry, evicting least recently used entries until it fits.
    ///
    /// An existing entry under the same key is replaced. An entry larger than
    /// the whole budget is not stored and also drops any older copy.
    pub fn insert(&mut self, entry: CacheEntry) -> Placement {
        self.remove(&entry.key);

        if entry.size_bytes > self.budget {
            self.stats.record_skipped_admission();
            debug!(key = %entry.key, size = entry.size_bytes, budget = self.budget, "session admission skipped");
            self.sync_occupancy();
            return Placement::Skipped;
        }

        let evicted = self.evict_until_fits(entry.size_bytes);
        self.bytes += entry.size_bytes;
        self.lru.touch(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
        self.sync_occupancy();

        Placement::Stored { evicted }
    }

    // == Evict If Needed ==
    /// Evicts until the tier is within budget. Returns the evicted keys.
    pub fn evict_if_needed(&mut self) -> Vec<CacheKey> {
        let evicted = self.evict_until_fits(0);
        self.sync_occupancy();
        evicted
    }

    fn evict_until_fits(&mut self, incoming: usize) -> Vec<CacheKey> {
        let mut evicted = Vec::new();
        while self.bytes + incoming > self.budget {
            let Some(victim) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(old) = self.entries.remove(&victim) {
                self.bytes -= old.size_bytes;
                self.stats.record_eviction();
                debug!(key = %victim, size = old.size_bytes, "session entry evicted");
            }
            evicted.push(victim);
        }
        evicted
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key)?;
        self.lru.remove(key);
        self.bytes -= removed.size_bytes;
        self.sync_occupancy();
        Some(removed)
    }

    /// Drops every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.bytes = 0;
        self.sync_occupancy();
        count
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn sync_occupancy(&mut self) {
        self.stats.set_occupancy(self.entries.len(), self.bytes);
    }
}
