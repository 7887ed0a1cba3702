//! Data Service
//!
//! The consumer-facing entry point. Ties the router, the two cache tiers,
//! the single-flight table, the fetch executor and the validator into one
//! `get_data` path:
//!
//! route → lookup (session, hot) → join or start the key's fetch →
//! execute → validate → admit → respond.

mod flight;
mod session;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, CacheStore, SharedCache};
use crate::config::Config;
use crate::error::{DataServiceError, Result};
use crate::fetch::{DataProvider, FetchExecutor, FetchOperation, FetchedData};
use crate::models::{DataRequest, ValidatedPayload};
use crate::router::RequestRouter;
use crate::validator::DataValidator;

use flight::{Delivered, InFlight, Join, JoinOr, Outcome};
use session::SessionRegistry;
use stats::ServiceCounters;

pub use session::Session;
pub use stats::ServiceStats;

// == Data Service ==
/// Shared handle to the service. Cheap to clone; every clone sees the same
/// hot tier, in-flight table and session registry.
#[derive(Debug, Clone)]
pub struct DataService {
    inner: Arc<ServiceInner>,
}

#[derive(Debug)]
struct ServiceInner {
    config: Config,
    router: RequestRouter,
    validator: DataValidator,
    executor: FetchExecutor,
    shared: Arc<SharedCache>,
    flights: InFlight,
    sessions: SessionRegistry,
    counters: ServiceCounters,
}

impl DataService {
    // == Constructors ==
    pub fn new(config: Config, provider: Arc<dyn DataProvider>) -> Self {
        let executor = FetchExecutor::from_config(provider, &config);
        Self::with_executor(config, executor)
    }

    /// Builds the service around a preconfigured executor (e.g. one with an
    /// alternative source).
    pub fn with_executor(config: Config, executor: FetchExecutor) -> Self {
        let shared = Arc::new(SharedCache::new(&config.cache, config.weights));
        Self {
            inner: Arc::new(ServiceInner {
                router: RequestRouter::with_max_rows(config.max_rows_per_request),
                validator: DataValidator::new(config.max_null_ratio),
                executor,
                shared,
                flights: InFlight::new(),
                sessions: SessionRegistry::default(),
                counters: ServiceCounters::default(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // == Sessions ==
    /// Opens an unnamed session. Its session tier is dropped with it.
    pub fn open_session(&self) -> Session {
        Session::new(self.clone(), self.new_store(), None)
    }

    /// Returns the named session, opening it on first use.
    pub async fn session(&self, id: &str) -> Session {
        let store = self
            .inner
            .sessions
            .checkout(id, || {
                info!(session = id, "session opened");
                self.new_store()
            })
            .await;
        Session::new(self.clone(), store, Some(id.to_string()))
    }

    /// Returns the named session if it exists, without marking it used.
    pub async fn existing_session(&self, id: &str) -> Option<Session> {
        let store = self.inner.sessions.peek(id).await?;
        Some(Session::new(self.clone(), store, Some(id.to_string())))
    }

    /// Ends a named session and flushes its session tier.
    ///
    /// Returns the number of entries flushed, or `None` for an unknown id.
    pub async fn end_session(&self, id: &str) -> Option<usize> {
        let store = self.inner.sessions.remove(id).await?;
        let flushed = store.flush_session().await;
        info!(session = id, flushed, "session ended");
        Some(flushed)
    }

    /// Ends every named session idle for longer than the configured timeout.
    pub async fn reap_idle_sessions(&self) -> Vec<String> {
        let idle = self
            .inner
            .sessions
            .take_idle(self.inner.config.session_idle_timeout)
            .await;
        let mut ended = Vec::with_capacity(idle.len());
        for (id, store) in idle {
            let flushed = store.flush_session().await;
            info!(session = %id, flushed, "idle session reaped");
            ended.push(id);
        }
        ended
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.len().await
    }

    // == Hot Tier ==
    /// Explicit flush of the process-wide hot tier.
    pub async fn flush_hot(&self) -> usize {
        self.inner.shared.flush_hot().await
    }

    pub async fn hot_stats(&self) -> CacheStats {
        self.inner.shared.hot_stats().await
    }

    pub async fn stats(&self) -> ServiceStats {
        let in_flight = self.inner.flights.len().await;
        let sessions = self.inner.sessions.len().await;
        self.inner.counters.snapshot(in_flight, sessions)
    }

    fn new_store(&self) -> CacheStore {
        CacheStore::new(
            self.inner.config.cache.session_budget_bytes,
            self.inner.shared.clone(),
        )
    }

    pub(crate) fn record_timeout(&self) {
        self.inner.counters.record_timeout();
    }

    // == Get Data ==
    /// Serves a request for the session owning `store`.
    ///
    /// Concurrent misses on one key share a single fetch. The fetch runs in
    /// its own task, so abandoning this future never disturbs other waiters.
    pub(crate) async fn get_data(
        &self,
        store: &CacheStore,
        request: &DataRequest,
    ) -> Result<ValidatedPayload> {
        let (operation, key) = self.inner.router.resolve(request)?;
        self.inner.counters.record_request();

        if let Some(entry) = store.lookup(&key).await {
            self.inner.counters.record_cache_hit();
            return Ok(entry.payload);
        }

        // The result may have been admitted between the lookup above and
        // taking the in-flight lock
        let recheck = async {
            if store.in_session(&key).await || store.in_hot(&key).await {
                store.lookup(&key).await
            } else {
                None
            }
        };

        let subscription = match self.inner.flights.join(&key, store, recheck).await {
            JoinOr::Ready(entry) => {
                self.inner.counters.record_cache_hit();
                return Ok(entry.payload);
            }
            JoinOr::Joined(Join::Follower(subscription)) => {
                self.inner.counters.record_coalesced();
                debug!(key = %key, "joined in-flight fetch");
                subscription
            }
            JoinOr::Joined(Join::Leader(subscription, tx)) => {
                self.inner.counters.record_fetch();
                let inner = self.inner.clone();
                let origin = store.clone();
                let fetch_key = key.clone();
                tokio::spawn(async move {
                    inner.run_fetch(operation, fetch_key, origin, tx).await;
                });
                subscription
            }
        };

        let admitted_here = subscription.origin().same_session(store);
        let delivered = subscription.outcome().await?;
        if delivered.admissible && !admitted_here {
            store
                .admit(key, delivered.payload.clone(), delivered.cost)
                .await;
        }
        Ok(delivered.payload)
    }
}

impl ServiceInner {
    /// Body of the spawned fetch task for one key.
    async fn run_fetch(
        self: Arc<Self>,
        operation: FetchOperation,
        key: CacheKey,
        store: CacheStore,
        tx: tokio::sync::watch::Sender<Outcome>,
    ) {
        let outcome = self.fetch_and_admit(&operation, &key, &store).await;
        if let Err(err) = &outcome {
            self.counters.record_fetch_failure();
            warn!(key = %key, kind = ?err.kind(), error = %err, "fetch failed");
        }
        // Admission already happened, so lookups from here on hit the cache
        self.flights.finish(&key).await;
        tx.send_replace(Some(outcome));
    }

    async fn fetch_and_admit(
        &self,
        operation: &FetchOperation,
        key: &CacheKey,
        store: &CacheStore,
    ) -> Result<Delivered> {
        let fetched = self.executor.execute(operation, key, store).await?;
        let cost = fetched.cost;

        match fetched.data {
            FetchedData::Cached(payload) => {
                self.counters.record_stale_served();
                info!(key = %key, "serving stale cached data");
                Ok(Delivered {
                    payload,
                    cost,
                    admissible: false,
                })
            }
            FetchedData::Raw(raw) => {
                let payload = self
                    .validator
                    .validate_operation(raw, operation)
                    .map_err(|err| {
                        self.counters.record_validation_failure();
                        DataServiceError::from(err)
                    })?;
                let placed = store.admit(key.clone(), payload.clone(), cost).await;
                debug!(key = %key, session = placed.session, hot = placed.hot, ?cost, "fetched payload admitted");
                Ok(Delivered {
                    payload,
                    cost,
                    admissible: true,
                })
            }
        }
    }
}

/// Waits on `future` for at most `timeout`.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    future: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(DataServiceError::Timeout { waited: timeout }),
    }
}
