//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const MB: usize = 1024 * 1024;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache tier budgets and lifetimes
    pub cache: CacheConfig,
    /// Eviction priority weights
    pub weights: ScoreWeights,
    /// Rate-limit retry schedule
    pub backoff: BackoffPolicy,
    /// Maximum fraction of null cells a payload may carry
    pub max_null_ratio: f64,
    /// Largest result, in estimated rows, a single request may ask for
    pub max_rows_per_request: usize,
    /// Upper bound on a single provider call
    pub fetch_timeout: Duration,
    /// Default bound on how long a consumer waits for data
    pub request_timeout: Option<Duration>,
    /// Sessions unused for this long are ended by the reaper
    pub session_idle_timeout: Duration,
    /// How often the reaper runs
    pub reaper_interval: Duration,
    /// HTTP server port
    pub server_port: u16,
}

/// Byte budgets and lifetimes for the cache tiers.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub session_budget_bytes: usize,
    pub hot_budget_bytes: usize,
    pub hot_ttl: Duration,
    /// Budget for expired or evicted hot entries kept for stale fallback
    pub stale_budget_bytes: usize,
    /// Lookup hits a key needs beyond which it is admitted to the hot tier
    pub promotion_threshold: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_budget_bytes: 50 * MB,
            hot_budget_bytes: 200 * MB,
            hot_ttl: Duration::from_secs(24 * 60 * 60),
            stale_budget_bytes: 16 * MB,
            promotion_threshold: 5,
        }
    }
}

/// Weights for the four eviction priority factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub access_frequency: f64,
    pub data_size: f64,
    pub fetch_cost: f64,
    pub update_frequency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            access_frequency: 0.25,
            data_size: 0.25,
            fetch_cost: 0.25,
            update_frequency: 0.25,
        }
    }
}

/// Exponential backoff schedule for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_wait: Duration,
    pub multiplier: f64,
    pub max_wait: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(1),
            multiplier: 2.0,
            max_wait: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SESSION_CACHE_BYTES` - Session tier budget (default: 50 MB)
    /// - `HOT_CACHE_BYTES` - Hot tier budget (default: 200 MB)
    /// - `HOT_CACHE_TTL_SECS` - Hot entry lifetime (default: 86400)
    /// - `STALE_SHELF_BYTES` - Stale fallback budget (default: 16 MB)
    /// - `PROMOTION_THRESHOLD` - Hits before hot admission (default: 5)
    /// - `BACKOFF_INITIAL_MS` - First rate-limit wait (default: 1000)
    /// - `BACKOFF_MAX_MS` - Longest rate-limit wait (default: 60000)
    /// - `BACKOFF_MAX_ATTEMPTS` - Attempts per fetch (default: 3)
    /// - `MAX_NULL_RATIO` - Validator null threshold (default: 0.1)
    /// - `MAX_ROWS_PER_REQUEST` - Row estimate above which requests are rejected (default: 100000)
    /// - `FETCH_TIMEOUT_SECS` - Per-call provider timeout, at least 1 (default: 30)
    /// - `REQUEST_TIMEOUT_SECS` - Consumer wait bound, 0 disables (default: 0)
    /// - `SESSION_IDLE_SECS` - Idle session lifetime (default: 1800)
    /// - `REAPER_INTERVAL_SECS` - Reaper frequency, at least 1 (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache = CacheConfig {
            session_budget_bytes: env_or("SESSION_CACHE_BYTES", defaults.cache.session_budget_bytes),
            hot_budget_bytes: env_or("HOT_CACHE_BYTES", defaults.cache.hot_budget_bytes),
            hot_ttl: Duration::from_secs(env_or(
                "HOT_CACHE_TTL_SECS",
                defaults.cache.hot_ttl.as_secs(),
            )),
            stale_budget_bytes: env_or("STALE_SHELF_BYTES", defaults.cache.stale_budget_bytes),
            promotion_threshold: env_or("PROMOTION_THRESHOLD", defaults.cache.promotion_threshold),
        };

        let backoff = BackoffPolicy {
            initial_wait: Duration::from_millis(env_or(
                "BACKOFF_INITIAL_MS",
                defaults.backoff.initial_wait.as_millis() as u64,
            )),
            max_wait: Duration::from_millis(env_or(
                "BACKOFF_MAX_MS",
                defaults.backoff.max_wait.as_millis() as u64,
            )),
            max_attempts: env_or("BACKOFF_MAX_ATTEMPTS", defaults.backoff.max_attempts).max(1),
            ..defaults.backoff
        };

        let request_timeout = match env_or("REQUEST_TIMEOUT_SECS", 0u64) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            cache,
            weights: defaults.weights,
            backoff,
            max_null_ratio: env_or("MAX_NULL_RATIO", defaults.max_null_ratio),
            max_rows_per_request: env_or("MAX_ROWS_PER_REQUEST", defaults.max_rows_per_request)
                .max(1),
            fetch_timeout: Duration::from_secs(
                env_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout.as_secs()).max(1),
            ),
            request_timeout,
            session_idle_timeout: Duration::from_secs(env_or(
                "SESSION_IDLE_SECS",
                defaults.session_idle_timeout.as_secs(),
            )),
            reaper_interval: Duration::from_secs(
                env_or("REAPER_INTERVAL_SECS", defaults.reaper_interval.as_secs()).max(1),
            ),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            weights: ScoreWeights::default(),
            backoff: BackoffPolicy::default(),
            max_null_ratio: 0.10,
            max_rows_per_request: 100_000,
            fetch_timeout: Duration::from_secs(30),
            request_timeout: None,
            session_idle_timeout: Duration::from_secs(30 * 60),
            reaper_interval: Duration::from_secs(60),
            server_port: 3000,
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
