//! Hot Tier Module
//!
//! Process-wide, byte-budgeted storage evicted by priority score. Entries
//! also expire after a fixed TTL; expiry is checked lazily on lookup.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, CacheStats, PriorityScorer};

/// Outcome of a hot-tier lookup.
#[derive(Debug)]
pub enum HotLookup {
    Hit(CacheEntry),
    /// The entry had outlived the TTL and was removed
    Expired(CacheEntry),
    Miss,
}

/// Result of offering an entry to the hot tier.
#[derive(Debug)]
pub enum HotPlacement {
    Stored { evicted: Vec<CacheEntry> },
    /// Larger than the whole budget; `displaced` is the key's previous hot copy
    Skipped { displaced: Option<CacheEntry> },
}

// == Hot Tier ==
#[derive(Debug)]
pub struct HotTier {
    entries: HashMap<CacheKey, CacheEntry>,
    bytes: usize,
    budget: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl HotTier {
    pub fn new(budget_bytes: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            bytes: 0,
            budget: budget_bytes,
            ttl,
            stats: CacheStats::new(budget_bytes),
        }
    }

    // == Lookup ==
    /// Returns a live entry, or removes and reports one that has expired.
    pub fn lookup(&mut self, key: &CacheKey) -> HotLookup {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return HotLookup::Miss;
            }
            Some(entry) => entry.is_expired(self.ttl),
        };

        if expired {
            self.stats.record_miss();
            self.stats.record_expiration();
            return match self.take(key) {
                Some(entry) => {
                    debug!(key = %key, age = ?entry.age(), "hot entry expired");
                    HotLookup::Expired(entry)
                }
                None => HotLookup::Miss,
            };
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.stats.record_hit();
                HotLookup::Hit(entry.clone())
            }
            None => HotLookup::Miss,
        }
    }

    /// Reads an entry regardless of TTL, without counting an access.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores an entry, evicting the lowest-priority entries until it fits.
    pub fn insert(&mut self, entry: CacheEntry, scorer: &PriorityScorer) -> HotPlacement {
        let displaced = self.take(&entry.key);

        if entry.size_bytes > self.budget {
            self.stats.record_skipped_admission();
            debug!(key = %entry.key, size = entry.size_bytes, budget = self.budget, "hot admission skipped");
            return HotPlacement::Skipped { displaced };
        }

        let evicted = self.evict_until_fits(entry.size_bytes, scorer);
        self.bytes += entry.size_bytes;
        self.entries.insert(entry.key.clone(), entry);
        self.sync_occupancy();

        HotPlacement::Stored { evicted }
    }

    // == Evict If Needed ==
    /// Evicts until the tier is within budget.
    pub fn evict_if_needed(&mut self, scorer: &PriorityScorer) -> Vec<CacheEntry> {
        self.evict_until_fits(0, scorer)
    }

    fn evict_until_fits(&mut self, incoming: usize, scorer: &PriorityScorer) -> Vec<CacheEntry> {
        if self.bytes + incoming <= self.budget {
            return Vec::new();
        }

        let candidates: Vec<(CacheKey, tokio::time::Instant)> = self
            .entries
            .values()
            .map(|e| (e.key.clone(), e.last_access_at))
            .collect();

        let mut evicted = Vec::new();
        for victim in scorer.eviction_order(&candidates) {
            if self.bytes + incoming <= self.budget {
                break;
            }
            if let Some(entry) = self.take(&victim) {
                self.stats.record_eviction();
                debug!(key = %victim, size = entry.size_bytes, "hot entry evicted");
                evicted.push(entry);
            }
        }
        self.sync_occupancy();
        evicted
    }

    fn take(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.bytes -= entry.size_bytes;
        self.sync_occupancy();
        Some(entry)
    }

    /// Drops every entry, returning them.
    pub fn drain(&mut self) -> Vec<CacheEntry> {
        let drained: Vec<CacheEntry> = self.entries.drain().map(|(_, e)| e).collect();
        self.bytes = 0;
        self.sync_occupancy();
        drained
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

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn sync_occupancy(&mut self) {
        self.stats.set_occupancy(self.entries.len(), self.bytes);
    }
}
