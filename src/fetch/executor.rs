//! Fetch Executor
//!
//! Runs one provider call to completion: retries rate-limited attempts with
//! exponential backoff, then walks the fallback chain when the primary
//! provider cannot deliver.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::cache::CacheKey;
use crate::config::{BackoffPolicy, Config};
use crate::error::{DataServiceError, FetchFailure, Result};
use crate::fetch::{DataProvider, FallbackStep, FetchOperation, StaleLookup};
use crate::models::{RawPayload, ValidatedPayload};

/// Where a fetched payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Remote,
    Alternative,
    StaleCache,
}

/// Payload as handed back by the executor.
#[derive(Debug, Clone)]
pub enum FetchedData {
    /// Fresh provider table, still to be validated
    Raw(RawPayload),
    /// Previously validated copy served from the cache
    Cached(ValidatedPayload),
}

/// Successful outcome of [`FetchExecutor::execute`].
#[derive(Debug, Clone)]
pub struct Fetched {
    pub data: FetchedData,
    pub source: PayloadSource,
    /// Wall-clock time from the first attempt until data was in hand
    pub cost: Duration,
}

impl Fetched {
    /// Stale results go back to the caller but must not be cached again.
    pub fn is_admissible(&self) -> bool {
        self.source != PayloadSource::StaleCache
    }
}

// == Fetch Executor ==
pub struct FetchExecutor {
    primary: Arc<dyn DataProvider>,
    alternative: Option<Arc<dyn DataProvider>>,
    backoff: BackoffPolicy,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for FetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExecutor")
            .field("primary", &self.primary.name())
            .field("alternative", &self.alternative.as_ref().map(|p| p.name().to_string()))
            .field("backoff", &self.backoff)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl FetchExecutor {
    pub fn new(primary: Arc<dyn DataProvider>, backoff: BackoffPolicy, fetch_timeout: Duration) -> Self {
        Self {
            primary,
            alternative: None,
            backoff,
            fetch_timeout,
        }
    }

    pub fn from_config(primary: Arc<dyn DataProvider>, config: &Config) -> Self {
        Self::new(primary, config.backoff, config.fetch_timeout)
    }

    /// Adds a secondary provider for the `alternative_source` fallback step.
    pub fn with_alternative(mut self, alternative: Arc<dyn DataProvider>) -> Self {
        self.alternative = Some(alternative);
        self
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    // == Execute ==
    /// Fetches data for `operation`.
    ///
    /// Rate-limited attempts are retried up to `max_attempts` times, sleeping
    /// `wait_after(n)` between attempts. Network and provider errors end the
    /// primary phase at once. Either way the fallback chain runs next.
    ///
    /// # Errors
    /// - `MaxRetriesExceeded` when rate limiting exhausted the attempts and
    ///   no fallback step produced data
    /// - `DataUnavailable` when any other failure left every step empty
    pub async fn execute(
        &self,
        operation: &FetchOperation,
        key: &CacheKey,
        stale: &dyn StaleLookup,
    ) -> Result<Fetched> {
        let started = Instant::now();
        let max_attempts = self.backoff.max_attempts.max(1);
        let mut attempt = 0;

        let failure = loop {
            attempt += 1;
            match self.call(self.primary.as_ref(), operation).await {
                Ok(raw) => {
                    let cost = started.elapsed();
                    info!(key = %key, provider = self.primary.name(), attempt, rows = raw.row_count(), ?cost, "fetch succeeded");
                    return Ok(Fetched {
                        data: FetchedData::Raw(raw),
                        source: PayloadSource::Remote,
                        cost,
                    });
                }
                Err(FetchFailure::RateLimited(reason)) if attempt < max_attempts => {
                    let wait = self.backoff.wait_after(attempt);
                    warn!(key = %key, attempt, ?wait, %reason, "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(failure) => break failure,
            }
        };

        warn!(key = %key, attempt, error = %failure, "primary provider failed, trying fallbacks");
        let mut reasons = vec![failure.to_string()];

        for step in FallbackStep::CHAIN {
            match self.run_step(step, operation, key, stale, started).await {
                Ok(fetched) => {
                    info!(key = %key, step = %step, "fallback step produced data");
                    return Ok(fetched);
                }
                Err(reason) => {
                    warn!(key = %key, step = %step, %reason, "fallback step failed");
                    reasons.push(format!("{step}: {reason}"));
                }
            }
        }

        if matches!(failure, FetchFailure::RateLimited(_)) {
            Err(DataServiceError::MaxRetriesExceeded {
                attempts: attempt,
                cause: failure,
            })
        } else {
            Err(DataServiceError::DataUnavailable {
                cause: reasons.join("; "),
            })
        }
    }

    async fn run_step(
        &self,
        step: FallbackStep,
        operation: &FetchOperation,
        key: &CacheKey,
        stale: &dyn StaleLookup,
        started: Instant,
    ) -> std::result::Result<Fetched, String> {
        match step {
            FallbackStep::CachedData => {
                let payload = stale
                    .stale_payload(key)
                    .await
                    .ok_or_else(|| "no cached copy".to_string())?;
                Ok(Fetched {
                    data: FetchedData::Cached(payload),
                    source: PayloadSource::StaleCache,
                    cost: started.elapsed(),
                })
            }
            FallbackStep::AlternativeSource => {
                let provider = self
                    .alternative
                    .as_ref()
                    .ok_or_else(|| "no alternative source configured".to_string())?;
                let raw = self
                    .call(provider.as_ref(), operation)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(Fetched {
                    data: FetchedData::Raw(raw),
                    source: PayloadSource::Alternative,
                    cost: started.elapsed(),
                })
            }
        }
    }

    /// One provider call bounded by the per-attempt timeout.
    async fn call(
        &self,
        provider: &dyn DataProvider,
        operation: &FetchOperation,
    ) -> std::result::Result<RawPayload, FetchFailure> {
        match tokio::time::timeout(self.fetch_timeout, operation.invoke(provider)).await {
            Ok(result) => result,
            Err(_) => Err(FetchFailure::Network(format!(
                "{} did not answer within {:?}",
                provider.name(),
                self.fetch_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchParams, NoStaleData};
    use crate::models::DateRange;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a fixed failure a number of times, then succeeds.
    struct Flaky {
        failure: FetchFailure,
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failure: FetchFailure, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failure,
                failures,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn daily_bar(&self, _params: &FetchParams) -> std::result::Result<RawPayload, FetchFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.failure.clone())
            } else {
                Ok(RawPayload::default())
            }
        }
    }

    struct Hanging;

    #[async_trait]
    impl DataProvider for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn daily_bar(&self, _params: &FetchParams) -> std::result::Result<RawPayload, FetchFailure> {
            std::future::pending().await
        }
    }

    struct Shelf(ValidatedPayload);

    #[async_trait]
    impl StaleLookup for Shelf {
        async fn stale_payload(&self, _key: &CacheKey) -> Option<ValidatedPayload> {
            Some(self.0.clone())
        }
    }

    fn op() -> FetchOperation {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        FetchOperation::DailyBar(FetchParams {
            instrument_code: "600519.SH".to_string(),
            date_range: DateRange::new(day, day),
            exchange: None,
        })
    }

    fn key() -> CacheKey {
        CacheKey::from("daily_bar:600519.SH:20240102-20240102")
    }

    fn executor(primary: Arc<dyn DataProvider>) -> FetchExecutor {
        FetchExecutor::new(primary, BackoffPolicy::default(), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let provider = Flaky::new(FetchFailure::Network("x".into()), 0);
        let fetched = executor(provider.clone())
            .execute(&op(), &key(), &NoStaleData)
            .await
            .unwrap();
        assert_eq!(fetched.source, PayloadSource::Remote);
        assert!(fetched.is_admissible());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success_waits_one_second() {
        let provider = Flaky::new(FetchFailure::RateLimited("quota".into()), 1);
        let started = Instant::now();
        let fetched = executor(provider.clone())
            .execute(&op(), &key(), &NoStaleData)
            .await
            .unwrap();
        assert_eq!(fetched.source, PayloadSource::Remote);
        assert_eq!(provider.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion() {
        let provider = Flaky::new(FetchFailure::RateLimited("quota".into()), u32::MAX);
        let started = Instant::now();
        let err = executor(provider.clone())
            .execute(&op(), &key(), &NoStaleData)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DataServiceError::MaxRetriesExceeded {
                attempts: 3,
                cause: FetchFailure::RateLimited("quota".into()),
            }
        );
        assert_eq!(provider.calls(), 3);
        // 1s + 2s, nothing after the last attempt
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_is_not_retried() {
        let provider = Flaky::new(FetchFailure::Network("reset".into()), u32::MAX);
        let err = executor(provider.clone())
            .execute(&op(), &key(), &NoStaleData)
            .await
            .unwrap_err();
        assert!(matches!(err, DataServiceError::DataUnavailable { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_comes_before_alternative() {
        let stale = crate::cache::test_support::payload_of_size(10);
        let alternative = Flaky::new(FetchFailure::Network("x".into()), 0);
        let exec = executor(Flaky::new(FetchFailure::Network("down".into()), u32::MAX))
            .with_alternative(alternative.clone());

        let fetched = exec.execute(&op(), &key(), &Shelf(stale.clone())).await.unwrap();
        assert_eq!(fetched.source, PayloadSource::StaleCache);
        assert!(!fetched.is_admissible());
        match fetched.data {
            FetchedData::Cached(p) => assert!(p.ptr_eq(&stale)),
            FetchedData::Raw(_) => panic!("expected the cached copy"),
        }
        assert_eq!(alternative.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternative_source_used_without_stale_copy() {
        let alternative = Flaky::new(FetchFailure::Network("x".into()), 0);
        let exec = executor(Flaky::new(FetchFailure::Provider("bad".into()), u32::MAX))
            .with_alternative(alternative.clone());

        let fetched = exec.execute(&op(), &key(), &NoStaleData).await.unwrap();
        assert_eq!(fetched.source, PayloadSource::Alternative);
        assert_eq!(alternative.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_rate_limit_exhaustion() {
        let alternative = Flaky::new(FetchFailure::Network("x".into()), 0);
        let exec = executor(Flaky::new(FetchFailure::RateLimited("quota".into()), u32::MAX))
            .with_alternative(alternative);
        let fetched = exec.execute(&op(), &key(), &NoStaleData).await.unwrap();
        assert_eq!(fetched.source, PayloadSource::Alternative);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_step_failing_surfaces_data_unavailable() {
        let exec = executor(Flaky::new(FetchFailure::Network("down".into()), u32::MAX))
            .with_alternative(Flaky::new(FetchFailure::Network("also down".into()), u32::MAX));
        match exec.execute(&op(), &key(), &NoStaleData).await {
            Err(DataServiceError::DataUnavailable { cause }) => {
                assert!(cause.contains("down"));
                assert!(cause.contains("try_cached_data"));
                assert!(cause.contains("alternative_source"));
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_network_error() {
        let exec = FetchExecutor::new(Arc::new(Hanging), BackoffPolicy::default(), Duration::from_secs(5));
        let started = Instant::now();
        let err = exec.execute(&op(), &key(), &NoStaleData).await.unwrap_err();
        assert!(matches!(err, DataServiceError::DataUnavailable { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }
}
