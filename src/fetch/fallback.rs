//! Fallback chain
//!
//! Ordered recovery steps tried after the primary provider fails for good.

use std::fmt;

use async_trait::async_trait;

use crate::cache::{CacheKey, CacheStore};
use crate::models::ValidatedPayload;

/// One recovery step. Steps run in [`FallbackStep::CHAIN`] order and the
/// first one that yields data wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep {
    /// Serve whatever copy the cache still holds, ignoring freshness
    CachedData,
    /// Ask the configured secondary provider
    AlternativeSource,
}

impl FallbackStep {
    pub const CHAIN: [FallbackStep; 2] = [FallbackStep::CachedData, FallbackStep::AlternativeSource];

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStep::CachedData => "try_cached_data",
            FallbackStep::AlternativeSource => "alternative_source",
        }
    }
}

impl fmt::Display for FallbackStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to semantically stale cached data.
#[async_trait]
pub trait StaleLookup: Send + Sync {
    async fn stale_payload(&self, key: &CacheKey) -> Option<ValidatedPayload>;
}

#[async_trait]
impl StaleLookup for CacheStore {
    async fn stale_payload(&self, key: &CacheKey) -> Option<ValidatedPayload> {
        CacheStore::stale_payload(self, key).await
    }
}

/// Lookup that never has anything; for callers with no cache at hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStaleData;

#[async_trait]
impl StaleLookup for NoStaleData {
    async fn stale_payload(&self, _key: &CacheKey) -> Option<ValidatedPayload> {
        None
    }
}
