//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and the tier they live in.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::cache::CacheKey;
use crate::models::ValidatedPayload;

// == Tier ==
/// Which cache scope an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Per-session, LRU-evicted
    Session,
    /// Process-wide, priority-evicted, TTL-bounded
    Hot,
}

// == Cache Entry ==
/// Represents a single cache entry with a validated payload and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: CacheKey,
    /// Validated, shared payload
    pub payload: ValidatedPayload,
    /// Serialized payload size counted against the tier budget
    pub size_bytes: usize,
    /// When the payload was admitted
    pub created_at: Instant,
    /// Last lookup hit (or admission)
    pub last_access_at: Instant,
    /// Admission plus every lookup hit
    pub access_count: u64,
    /// Tier holding this copy
    pub tier: Tier,
    /// Wall-clock time spent obtaining the payload
    pub fetch_cost: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a fresh entry. Admission counts as the first access.
    pub fn new(key: CacheKey, payload: ValidatedPayload, fetch_cost: Duration, tier: Tier) -> Self {
        let now = Instant::now();
        Self {
            key,
            size_bytes: payload.size_bytes(),
            payload,
            created_at: now,
            last_access_at: now,
            access_count: 1,
            tier,
            fetch_cost,
        }
    }

    /// Copy of this entry relabelled for another tier, statistics preserved.
    pub fn in_tier(&self, tier: Tier) -> Self {
        Self {
            tier,
            ..self.clone()
        }
    }

    /// Records a lookup hit.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_access_at = Instant::now();
    }

    /// Time since admission.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    // == Is Expired ==
    /// True once the entry has lived for at least `ttl`.
    ///
    /// The boundary counts as expired: once the full TTL has elapsed the entry
    /// must not be served.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }

    /// Remaining lifetime under `ttl`, zero once expired.
    pub fn ttl_remaining(&self, ttl: Duration) -> Duration {
        ttl.saturating_sub(self.age())
    }
}
