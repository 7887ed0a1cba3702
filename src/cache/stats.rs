//! Cache Statistics Module
//!
//! Tracks per-tier metrics including hits, misses, evictions and byte usage.

use serde::Serialize;

// == Cache Stats ==
/// Tracks performance and occupancy of one cache tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups served by this tier
    pub hits: u64,
    /// Lookups this tier could not serve
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Admissions skipped because the entry exceeded the whole budget
    pub skipped_admissions: u64,
    /// Current number of entries
    pub total_entries: usize,
    /// Current payload bytes held
    pub total_bytes: usize,
    /// Configured byte budget
    pub budget_bytes: usize,
}

impl CacheStats {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Fraction of the byte budget in use.
    pub fn utilization(&self) -> f64 {
        if self.budget_bytes == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.budget_bytes as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_skipped_admission(&mut self) {
        self.skipped_admissions += 1;
    }

    // == Update Occupancy ==
    pub fn set_occupancy(&mut self, entries: usize, bytes: usize) {
        self.total_entries = entries;
        self.total_bytes = bytes;
    }
}
