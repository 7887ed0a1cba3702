//! Service-level counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct ServiceCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    fetch_failures: AtomicU64,
    validation_failures: AtomicU64,
    stale_served: AtomicU64,
    timeouts: AtomicU64,
}

impl ServiceCounters {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, in_flight: usize, sessions: usize) -> ServiceStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ServiceStats {
            requests: load(&self.requests),
            cache_hits: load(&self.cache_hits),
            fetches: load(&self.fetches),
            coalesced_waits: load(&self.coalesced),
            fetch_failures: load(&self.fetch_failures),
            validation_failures: load(&self.validation_failures),
            stale_served: load(&self.stale_served),
            timeouts: load(&self.timeouts),
            in_flight,
            sessions,
        }
    }
}

/// Point-in-time view of request handling across all sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Calls to `get_data` that passed routing
    pub requests: u64,
    /// Requests served from a cache tier
    pub cache_hits: u64,
    /// Fetches actually started against the provider
    pub fetches: u64,
    /// Requests that waited on another caller's fetch
    pub coalesced_waits: u64,
    pub fetch_failures: u64,
    pub validation_failures: u64,
    /// Fetches answered from stale cached data
    pub stale_served: u64,
    /// Callers that stopped waiting
    pub timeouts: u64,
    pub in_flight: usize,
    pub sessions: usize,
}
