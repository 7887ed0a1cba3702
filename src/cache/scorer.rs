//! Priority scoring for hot-tier promotion and eviction.
//!
//! ```text
//! score(key) = w_f * freq
//!            + w_s * (1 - size)
//!            + w_c * cost
//!            + w_v * (1 - volatility)
//! ```
//!
//! Each factor is scaled to [0, 1] against the largest value among the keys
//! currently resident in the hot tier, plus the key being scored. Session
//! tier residents are left out: they are private to one session and never
//! compete for hot-tier space. Low scores are evicted first.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheKey, Tier};
use crate::config::ScoreWeights;

/// Access timestamps kept per key.
pub const RECENT_ACCESS_WINDOW: usize = 16;

/// Patterns tracked before non-resident ones are pruned.
pub const MAX_TRACKED_PATTERNS: usize = 10_000;

// == Access Pattern ==
/// Per-key counters and the scoring inputs recorded at admission.
#[derive(Debug, Clone)]
pub struct AccessPattern {
    pub hit_count_session: u64,
    pub hit_count_hot: u64,
    /// Most recent accesses, oldest first
    pub recent: VecDeque<Instant>,
    pub size_bytes: usize,
    pub fetch_cost: Duration,
    /// Upstream updates per day for the key's data class
    pub volatility: f64,
    /// Whether the key currently has a hot-tier entry
    pub in_hot: bool,
}

impl AccessPattern {
    fn new() -> Self {
        Self {
            hit_count_session: 0,
            hit_count_hot: 0,
            recent: VecDeque::with_capacity(RECENT_ACCESS_WINDOW),
            size_bytes: 0,
            fetch_cost: Duration::ZERO,
            volatility: 0.0,
            in_hot: false,
        }
    }

    /// Lookup hits across both tiers.
    pub fn total_hits(&self) -> u64 {
        self.hit_count_session + self.hit_count_hot
    }

    pub fn last_access(&self) -> Option<Instant> {
        self.recent.back().copied()
    }

    fn stamp(&mut self, now: Instant) {
        if self.recent.len() == RECENT_ACCESS_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(now);
    }
}

/// Raw factor values before normalization.
#[derive(Debug, Clone, Copy, Default)]
struct Factors {
    frequency: f64,
    size: f64,
    cost: f64,
    volatility: f64,
}

impl Factors {
    fn of(pattern: &AccessPattern) -> Self {
        Self {
            frequency: pattern.total_hits() as f64,
            size: pattern.size_bytes as f64,
            cost: pattern.fetch_cost.as_secs_f64(),
            volatility: pattern.volatility,
        }
    }

    fn max(self, other: Factors) -> Self {
        Self {
            frequency: self.frequency.max(other.frequency),
            size: self.size.max(other.size),
            cost: self.cost.max(other.cost),
            volatility: self.volatility.max(other.volatility),
        }
    }
}

fn normalized(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// == Priority Scorer ==
#[derive(Debug)]
pub struct PriorityScorer {
    weights: ScoreWeights,
    promotion_threshold: u64,
    patterns: HashMap<CacheKey, AccessPattern>,
}

impl PriorityScorer {
    pub fn new(weights: ScoreWeights, promotion_threshold: u64) -> Self {
        Self {
            weights,
            promotion_threshold,
            patterns: HashMap::new(),
        }
    }

    // == Recording ==
    /// Counts a lookup hit served by `tier`.
    pub fn record_hit(&mut self, key: &CacheKey, tier: Tier) {
        let now = Instant::now();
        let pattern = self.pattern_mut(key);
        match tier {
            Tier::Session => pattern.hit_count_session += 1,
            Tier::Hot => pattern.hit_count_hot += 1,
        }
        pattern.stamp(now);
    }

    /// Records the scoring inputs of a freshly admitted payload.
    pub fn record_admission(
        &mut self,
        key: &CacheKey,
        size_bytes: usize,
        fetch_cost: Duration,
        volatility: f64,
    ) {
        let now = Instant::now();
        let pattern = self.pattern_mut(key);
        pattern.size_bytes = size_bytes;
        pattern.fetch_cost = fetch_cost;
        pattern.volatility = volatility;
        pattern.stamp(now);
        self.prune();
    }

    pub fn set_hot_resident(&mut self, key: &CacheKey, resident: bool) {
        self.pattern_mut(key).in_hot = resident;
    }

    /// Drops all history for a key; called when its hot entry goes away.
    pub fn forget(&mut self, key: &CacheKey) {
        self.patterns.remove(key);
    }

    /// Drops history for every hot-resident key.
    pub fn forget_hot(&mut self) {
        self.patterns.retain(|_, p| !p.in_hot);
    }

    // == Should Promote ==
    /// True once the key's lookup hits exceed the promotion threshold.
    pub fn should_promote_to_hot(&self, key: &CacheKey) -> bool {
        self.patterns
            .get(key)
            .map(|p| p.total_hits() > self.promotion_threshold)
            .unwrap_or(false)
    }

    // == Score ==
    /// Priority of `key` relative to the keys resident in the hot tier.
    pub fn score(&self, key: &CacheKey) -> f64 {
        let Some(pattern) = self.patterns.get(key) else {
            return 0.0;
        };
        let max = self
            .patterns
            .values()
            .filter(|p| p.in_hot)
            .fold(Factors::of(pattern), |acc, p| acc.max(Factors::of(p)));
        self.weighted(Factors::of(pattern), max)
    }

    /// Orders candidates lowest priority first; ties go to the oldest access.
    pub fn eviction_order(&self, candidates: &[(CacheKey, Instant)]) -> Vec<CacheKey> {
        let factors: Vec<Factors> = candidates
            .iter()
            .map(|(key, _)| self.patterns.get(key).map(Factors::of).unwrap_or_default())
            .collect();
        let max = factors
            .iter()
            .copied()
            .fold(Factors::default(), Factors::max);

        let mut ranked: Vec<(f64, Instant, &CacheKey)> = candidates
            .iter()
            .zip(factors)
            .map(|((key, last_access), f)| (self.weighted(f, max), *last_access, key))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().map(|(_, _, key)| key.clone()).collect()
    }

    pub fn pattern(&self, key: &CacheKey) -> Option<&AccessPattern> {
        self.patterns.get(key)
    }

    pub fn tracked(&self) -> usize {
        self.patterns.len()
    }

    fn weighted(&self, f: Factors, max: Factors) -> f64 {
        let w = &self.weights;
        w.access_frequency * normalized(f.frequency, max.frequency)
            + w.data_size * (1.0 - normalized(f.size, max.size))
            + w.fetch_cost * normalized(f.cost, max.cost)
            + w.update_frequency * (1.0 - normalized(f.volatility, max.volatility))
    }

    fn pattern_mut(&mut self, key: &CacheKey) -> &mut AccessPattern {
        self.patterns
            .entry(key.clone())
            .or_insert_with(AccessPattern::new)
    }

    /// Keeps the pattern table bounded by dropping the stalest non-hot keys.
    fn prune(&mut self) {
        if self.patterns.len() <= MAX_TRACKED_PATTERNS {
            return;
        }
        let excess = self.patterns.len() - MAX_TRACKED_PATTERNS;
        let mut stale: Vec<(Option<Instant>, CacheKey)> = self
            .patterns
            .iter()
            .filter(|(_, p)| !p.in_hot)
            .map(|(k, p)| (p.last_access(), k.clone()))
            .collect();
        stale.sort();
        for (_, key) in stale.into_iter().take(excess) {
            self.patterns.remove(&key);
        }
        debug!(dropped = excess, "pruned access patterns");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    fn scorer() -> PriorityScorer {
        PriorityScorer::new(ScoreWeights::default(), 5)
    }

    #[tokio::test]
    async fn test_promotion_after_threshold() {
        let mut scorer = scorer();
        let key = k("daily_bar:600519.SH:20240101-20240131");
        scorer.record_admission(&key, 100, Duration::from_millis(50), 1.0);

        for _ in 0..5 {
            scorer.record_hit(&key, Tier::Session);
        }
        assert!(!scorer.should_promote_to_hot(&key), "5 hits is not yet over the threshold");

        scorer.record_hit(&key, Tier::Session);
        assert!(scorer.should_promote_to_hot(&key));
    }

    #[tokio::test]
    async fn test_unknown_key_not_promoted() {
        assert!(!scorer().should_promote_to_hot(&k("nope")));
        assert_eq!(scorer().score(&k("nope")), 0.0);
    }

    #[tokio::test]
    async fn test_hot_hits_count_toward_promotion() {
        let mut scorer = scorer();
        let key = k("a");
        for _ in 0..3 {
            scorer.record_hit(&key, Tier::Session);
            scorer.record_hit(&key, Tier::Hot);
        }
        let pattern = scorer.pattern(&key).unwrap();
        assert_eq!(pattern.hit_count_session, 3);
        assert_eq!(pattern.hit_count_hot, 3);
        assert!(scorer.should_promote_to_hot(&key));
    }

    #[tokio::test]
    async fn test_recent_window_bounded() {
        let mut scorer = scorer();
        let key = k("a");
        for _ in 0..(RECENT_ACCESS_WINDOW + 10) {
            scorer.record_hit(&key, Tier::Session);
        }
        assert_eq!(scorer.pattern(&key).unwrap().recent.len(), RECENT_ACCESS_WINDOW);
    }

    #[tokio::test]
    async fn test_score_factors() {
        let mut scorer = scorer();
        let popular = k("popular");
        let bulky = k("bulky");

        scorer.record_admission(&popular, 100, Duration::from_secs(2), 1.0);
        scorer.record_admission(&bulky, 10_000, Duration::from_secs(2), 1.0);
        scorer.set_hot_resident(&popular, true);
        scorer.set_hot_resident(&bulky, true);
        for _ in 0..4 {
            scorer.record_hit(&popular, Tier::Hot);
        }

        assert!(scorer.score(&popular) > scorer.score(&bulky));
        let s = scorer.score(&popular);
        assert!((0.0..=1.0).contains(&s));
    }

    #[tokio::test]
    async fn test_volatile_and_cheap_data_scores_lower() {
        let mut scorer = scorer();
        let minutes = k("minutes");
        let factors = k("factors");
        scorer.record_admission(&minutes, 500, Duration::from_millis(100), 240.0);
        scorer.record_admission(&factors, 500, Duration::from_secs(3), 0.1);
        scorer.set_hot_resident(&minutes, true);
        scorer.set_hot_resident(&factors, true);

        assert!(scorer.score(&minutes) < scorer.score(&factors));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_order_ties_oldest_first() {
        let mut scorer = scorer();
        let a = k("a");
        let b = k("b");
        let c = k("c");
        scorer.record_admission(&a, 100, Duration::from_secs(1), 1.0);
        scorer.record_admission(&b, 100, Duration::from_secs(1), 1.0);
        scorer.record_admission(&c, 100, Duration::from_secs(1), 1.0);
        scorer.record_hit(&c, Tier::Hot);

        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let order = scorer.eviction_order(&[(b.clone(), t1), (a.clone(), t0), (c.clone(), t0)]);

        // a and b tie on score; a was accessed earlier. c scores highest.
        assert_eq!(order, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_forget_resets_counters() {
        let mut scorer = scorer();
        let key = k("a");
        for _ in 0..10 {
            scorer.record_hit(&key, Tier::Session);
        }
        scorer.forget(&key);
        assert!(scorer.pattern(&key).is_none());
        assert!(!scorer.should_promote_to_hot(&key));
    }

    #[tokio::test]
    async fn test_forget_hot_keeps_session_only_keys() {
        let mut scorer = scorer();
        scorer.record_hit(&k("hot"), Tier::Hot);
        scorer.set_hot_resident(&k("hot"), true);
        scorer.record_hit(&k("cold"), Tier::Session);

        scorer.forget_hot();
        assert!(scorer.pattern(&k("hot")).is_none());
        assert!(scorer.pattern(&k("cold")).is_some());
    }

    #[tokio::test]
    async fn test_pattern_table_bounded() {
        let mut scorer = scorer();
        let resident = k("resident");
        scorer.record_admission(&resident, 1, Duration::ZERO, 1.0);
        scorer.set_hot_resident(&resident, true);

        for i in 0..(MAX_TRACKED_PATTERNS + 5) {
            scorer.record_admission(&k(&format!("key-{i}")), 1, Duration::ZERO, 1.0);
        }
        assert!(scorer.tracked() <= MAX_TRACKED_PATTERNS);
        assert!(scorer.pattern(&resident).is_some());
    }
}
