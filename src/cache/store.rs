//! Cache Store Module
//!
//! Two-tier cache: a session tier owned by one consumer session and a hot
//! tier shared by the whole process. Lookups go session first, then hot;
//! admissions always land in the session tier and in the hot tier once the
//! key has proven popular.
//!
//! Lock order is session → hot → stale → scorer; no lock is taken while a
//! later one in that order is held.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::{
    CacheEntry, CacheKey, CacheStats, HotLookup, HotPlacement, HotTier, Placement,
    PriorityScorer, SessionTier, StaleShelf, Tier,
};
use crate::config::{CacheConfig, ScoreWeights};
use crate::models::ValidatedPayload;

// == Shared Cache ==
/// Process-wide state: the hot tier, its stale shelf and the priority scorer.
#[derive(Debug)]
pub struct SharedCache {
    hot: RwLock<HotTier>,
    stale: Mutex<StaleShelf>,
    scorer: Mutex<PriorityScorer>,
}

impl SharedCache {
    pub fn new(config: &CacheConfig, weights: ScoreWeights) -> Self {
        Self {
            hot: RwLock::new(HotTier::new(config.hot_budget_bytes, config.hot_ttl)),
            stale: Mutex::new(StaleShelf::new(config.stale_budget_bytes)),
            scorer: Mutex::new(PriorityScorer::new(weights, config.promotion_threshold)),
        }
    }

    pub async fn hot_stats(&self) -> CacheStats {
        self.hot.read().await.stats()
    }

    /// Current priority of a key, as used for hot-tier eviction.
    pub async fn score(&self, key: &CacheKey) -> f64 {
        self.scorer.lock().await.score(key)
    }

    pub async fn should_promote_to_hot(&self, key: &CacheKey) -> bool {
        self.scorer.lock().await.should_promote_to_hot(key)
    }

    pub async fn stale_len(&self) -> usize {
        self.stale.lock().await.len()
    }

    // == Flush Hot ==
    /// Empties the hot tier and the stale shelf. Returns the hot entries dropped.
    pub async fn flush_hot(&self) -> usize {
        let mut hot = self.hot.write().await;
        let dropped = hot.drain().len();
        self.stale.lock().await.clear();
        self.scorer.lock().await.forget_hot();
        info!(dropped, "hot tier flushed");
        dropped
    }

    /// Stores an entry in the hot tier and retires whatever it displaced.
    async fn place_hot(&self, entry: CacheEntry) -> bool {
        let key = entry.key.clone();
        let mut hot = self.hot.write().await;
        let placement = {
            let scorer = self.scorer.lock().await;
            hot.insert(entry, &scorer)
        };

        match placement {
            HotPlacement::Stored { evicted } => {
                let mut stale = self.stale.lock().await;
                stale.remove(&key);
                let evicted_keys: Vec<CacheKey> = evicted.iter().map(|e| e.key.clone()).collect();
                for retired in evicted {
                    stale.park(retired);
                }
                drop(stale);

                let mut scorer = self.scorer.lock().await;
                for k in &evicted_keys {
                    scorer.forget(k);
                }
                scorer.set_hot_resident(&key, true);
                if !evicted_keys.is_empty() {
                    info!(key = %key, evicted = evicted_keys.len(), "hot tier made room");
                }
                true
            }
            HotPlacement::Skipped { displaced } => {
                if let Some(previous) = displaced {
                    self.stale.lock().await.park(previous);
                    self.scorer.lock().await.forget(&key);
                    info!(key = %key, "oversized refresh moved hot copy to stale shelf");
                }
                false
            }
        }
    }
}

/// Where an admitted payload ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub session: bool,
    pub hot: bool,
}

// == Cache Store ==
/// One session's view of the cache: its own session tier plus the shared hot tier.
///
/// Cloning yields another handle to the same tiers.
#[derive(Debug, Clone)]
pub struct CacheStore {
    session: Arc<RwLock<SessionTier>>,
    shared: Arc<SharedCache>,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(session_budget_bytes: usize, shared: Arc<SharedCache>) -> Self {
        Self {
            session: Arc::new(RwLock::new(SessionTier::new(session_budget_bytes))),
            shared,
        }
    }

    /// Store with its own private hot tier.
    pub fn standalone(config: &CacheConfig, weights: ScoreWeights) -> Self {
        Self::new(
            config.session_budget_bytes,
            Arc::new(SharedCache::new(config, weights)),
        )
    }

    pub fn shared(&self) -> &Arc<SharedCache> {
        &self.shared
    }

    /// True when both handles refer to the same session tier.
    pub fn same_session(&self, other: &CacheStore) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    // == Lookup ==
    /// Finds a live entry, session tier first.
    ///
    /// A hot-tier hit is copied into the session tier (the hot entry stays).
    /// An expired hot entry is removed here and parked on the stale shelf.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut session = self.session.write().await;
        if let Some(entry) = session.get(key) {
            self.shared.scorer.lock().await.record_hit(key, Tier::Session);
            debug!(key = %key, "session hit");
            return Some(entry);
        }

        let mut hot = self.shared.hot.write().await;
        match hot.lookup(key) {
            HotLookup::Hit(entry) => {
                drop(hot);
                self.shared.scorer.lock().await.record_hit(key, Tier::Hot);
                if let Placement::Stored { evicted } = session.insert(entry.in_tier(Tier::Session)) {
                    if !evicted.is_empty() {
                        debug!(key = %key, evicted = evicted.len(), "promotion evicted session entries");
                    }
                }
                debug!(key = %key, "hot hit promoted to session");
                Some(entry)
            }
            HotLookup::Expired(entry) => {
                drop(hot);
                drop(session);
                self.shared.stale.lock().await.park(entry);
                self.shared.scorer.lock().await.forget(key);
                None
            }
            HotLookup::Miss => None,
        }
    }

    // == Admit ==
    /// Caches a validated payload.
    ///
    /// Always offered to the session tier; also offered to the hot tier when
    /// the key has crossed the promotion threshold or already lives there.
    pub async fn admit(
        &self,
        key: CacheKey,
        payload: ValidatedPayload,
        fetch_cost: Duration,
    ) -> Admission {
        let volatility = payload.update_frequency();
        let entry = CacheEntry::new(key.clone(), payload, fetch_cost, Tier::Session);
        let size = entry.size_bytes;

        let session = {
            let mut session = self.session.write().await;
            session.insert(entry.clone()).is_stored()
        };

        let already_hot = self.shared.hot.read().await.contains(&key);
        let promote = {
            let mut scorer = self.shared.scorer.lock().await;
            scorer.record_admission(&key, size, fetch_cost, volatility);
            already_hot || scorer.should_promote_to_hot(&key)
        };

        let hot = if promote {
            self.shared.place_hot(entry.in_tier(Tier::Hot)).await
        } else {
            false
        };

        debug!(key = %key, size, session, hot, "payload admitted");
        Admission { session, hot }
    }

    // == Evict If Needed ==
    /// Brings a tier back within its budget. Returns the number of entries evicted.
    pub async fn evict_if_needed(&self, tier: Tier) -> usize {
        match tier {
            Tier::Session => self.session.write().await.evict_if_needed().len(),
            Tier::Hot => {
                let mut hot = self.shared.hot.write().await;
                let evicted = {
                    let scorer = self.shared.scorer.lock().await;
                    hot.evict_if_needed(&scorer)
                };
                drop(hot);
                let count = evicted.len();
                let keys: Vec<CacheKey> = evicted.iter().map(|e| e.key.clone()).collect();
                {
                    let mut stale = self.shared.stale.lock().await;
                    for entry in evicted {
                        stale.park(entry);
                    }
                }
                let mut scorer = self.shared.scorer.lock().await;
                for key in &keys {
                    scorer.forget(key);
                }
                count
            }
        }
    }

    // == Stale Payload ==
    /// Best available copy for a key ignoring freshness: session, hot
    /// (expired or not), then the stale shelf. Does not count as an access.
    pub async fn stale_payload(&self, key: &CacheKey) -> Option<ValidatedPayload> {
        if let Some(entry) = self.session.read().await.peek(key) {
            return Some(entry.payload.clone());
        }
        if let Some(entry) = self.shared.hot.read().await.peek(key) {
            return Some(entry.payload.clone());
        }
        self.shared.stale.lock().await.get(key)
    }

    /// Drops every session-tier entry. The hot tier is untouched.
    pub async fn flush_session(&self) -> usize {
        self.session.write().await.clear()
    }

    pub async fn session_stats(&self) -> CacheStats {
        self.session.read().await.stats()
    }

    pub async fn hot_stats(&self) -> CacheStats {
        self.shared.hot_stats().await
    }

    /// Reads an entry (session tier first) without counting an access.
    pub async fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.session.read().await.peek(key) {
            return Some(entry.clone());
        }
        self.shared.hot.read().await.peek(key).cloned()
    }

    pub async fn in_session(&self, key: &CacheKey) -> bool {
        self.session.read().await.contains(key)
    }

    pub async fn in_hot(&self, key: &CacheKey) -> bool {
        self.shared.hot.read().await.contains(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::payload_of_size;

    fn config(session: usize, hot: usize) -> CacheConfig {
        CacheConfig {
            session_budget_bytes: session,
            hot_budget_bytes: hot,
            hot_ttl: Duration::from_secs(60),
            stale_budget_bytes: 100_000,
            promotion_threshold: 5,
        }
    }

    fn store() -> CacheStore {
        CacheStore::standalone(&config(100_000, 100_000), ScoreWeights::default())
    }

    fn key(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    #[tokio::test]
    async fn test_admit_then_lookup_same_payload() {
        let store = store();
        let payload = payload_of_size(200);
        store.admit(key("a"), payload.clone(), Duration::from_millis(30)).await;

        let entry = store.lookup(&key("a")).await.unwrap();
        assert!(entry.payload.ptr_eq(&payload));
        assert_eq!(entry.tier, Tier::Session);
        assert_eq!(entry.access_count, 2);
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let store = store();
        assert!(store.lookup(&key("missing")).await.is_none());
        assert_eq!(store.session_stats().await.misses, 1);
        assert_eq!(store.hot_stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_first_admission_stays_out_of_hot() {
        let store = store();
        let placed = store.admit(key("a"), payload_of_size(100), Duration::ZERO).await;
        assert_eq!(placed, Admission { session: true, hot: false });
        assert!(!store.in_hot(&key("a")).await);
    }

    #[tokio::test]
    async fn test_promotion_on_sixth_access() {
        let store = store();
        let k = key("a");
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;

        for _ in 0..5 {
            store.lookup(&k).await.unwrap();
        }
        assert!(!store.shared().should_promote_to_hot(&k).await);

        store.lookup(&k).await.unwrap();
        assert!(store.shared().should_promote_to_hot(&k).await);
        assert!(!store.in_hot(&k).await, "promotion happens on admission, not on lookup");

        let placed = store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        assert!(placed.hot);
        assert!(store.in_hot(&k).await);
    }

    #[tokio::test]
    async fn test_hot_hit_promotes_copy_to_session() {
        let shared = Arc::new(SharedCache::new(&config(100_000, 100_000), ScoreWeights::default()));
        let first = CacheStore::new(100_000, shared.clone());
        let k = key("a");
        first.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        for _ in 0..6 {
            first.lookup(&k).await;
        }
        first.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;

        // A new session sees the hot entry and gets a session copy
        let second = CacheStore::new(100_000, shared);
        let entry = second.lookup(&k).await.unwrap();
        assert_eq!(entry.tier, Tier::Hot);
        assert!(second.in_session(&k).await);
        assert!(second.in_hot(&k).await, "promotion never removes the hot entry");

        let again = second.lookup(&k).await.unwrap();
        assert_eq!(again.tier, Tier::Session);
    }

    #[tokio::test]
    async fn test_session_eviction_removes_from_lookup() {
        let sample = payload_of_size(300);
        let size = sample.size_bytes();
        let store = CacheStore::standalone(&config(size * 2, 100_000), ScoreWeights::default());

        store.admit(key("a"), payload_of_size(300), Duration::ZERO).await;
        store.admit(key("b"), payload_of_size(300), Duration::ZERO).await;
        store.admit(key("c"), payload_of_size(300), Duration::ZERO).await;

        assert!(store.lookup(&key("a")).await.is_none());
        assert!(store.lookup(&key("b")).await.is_some());
        assert!(store.lookup(&key("c")).await.is_some());
        let stats = store.session_stats().await;
        assert!(stats.total_bytes <= size * 2);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_oversized_payload_not_cached_anywhere() {
        let store = CacheStore::standalone(&config(50, 50), ScoreWeights::default());
        let placed = store.admit(key("big"), payload_of_size(500), Duration::ZERO).await;
        assert_eq!(placed, Admission { session: false, hot: false });
        assert!(store.lookup(&key("big")).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_refresh_of_hot_key_parks_previous_copy() {
        let size = payload_of_size(100).size_bytes();
        let store = CacheStore::standalone(&config(100_000, size * 3), ScoreWeights::default());
        let k = key("a");
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        for _ in 0..6 {
            store.lookup(&k).await.unwrap();
        }
        assert!(store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await.hot);

        let placed = store.admit(k.clone(), payload_of_size(10_000), Duration::ZERO).await;
        assert_eq!(placed, Admission { session: true, hot: false });
        assert!(!store.in_hot(&k).await);
        assert_eq!(store.shared().stale_len().await, 1);
        let other = CacheStore::new(100_000, store.shared().clone());
        let parked = other.stale_payload(&k).await.unwrap();
        assert_eq!(parked.size_bytes(), size);

        // History went with the hot copy
        let scorer = store.shared().scorer.lock().await;
        assert!(scorer.pattern(&k).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_hot_entry_goes_to_stale_shelf() {
        let shared = Arc::new(SharedCache::new(&config(100_000, 100_000), ScoreWeights::default()));
        let writer = CacheStore::new(100_000, shared.clone());
        let k = key("a");
        writer.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        for _ in 0..6 {
            writer.lookup(&k).await;
        }
        writer.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;

        tokio::time::advance(Duration::from_secs(61)).await;

        let reader = CacheStore::new(100_000, shared.clone());
        assert!(reader.lookup(&k).await.is_none(), "expired hot entry must not be served");
        assert!(!reader.in_hot(&k).await);
        assert_eq!(shared.stale_len().await, 1);
        assert!(reader.stale_payload(&k).await.is_some());
        assert_eq!(reader.hot_stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_flush_session_keeps_hot() {
        let store = store();
        let k = key("a");
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        for _ in 0..6 {
            store.lookup(&k).await;
        }
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;

        assert_eq!(store.flush_session().await, 1);
        assert!(!store.in_session(&k).await);
        assert!(store.lookup(&k).await.is_some());
    }

    #[tokio::test]
    async fn test_flush_hot() {
        let store = store();
        let k = key("a");
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;
        for _ in 0..6 {
            store.lookup(&k).await;
        }
        store.admit(k.clone(), payload_of_size(100), Duration::ZERO).await;

        assert_eq!(store.shared().flush_hot().await, 1);
        assert!(!store.in_hot(&k).await);
        assert!(store.in_session(&k).await);
    }

    #[tokio::test]
    async fn test_evict_if_needed_is_noop_within_budget() {
        let store = store();
        store.admit(key("a"), payload_of_size(100), Duration::ZERO).await;
        assert_eq!(store.evict_if_needed(Tier::Session).await, 0);
        assert_eq!(store.evict_if_needed(Tier::Hot).await, 0);
    }

    #[tokio::test]
    async fn test_same_session() {
        let store = store();
        let clone = store.clone();
        let other = CacheStore::new(100, store.shared().clone());
        assert!(store.same_session(&clone));
        assert!(!store.same_session(&other));
    }
}
