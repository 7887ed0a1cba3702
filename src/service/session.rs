//! Sessions
//!
//! A session is the ownership scope of one session tier. Named sessions are
//! tracked in a registry so HTTP callers can reuse them across requests and
//! idle ones can be reaped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::warn;

use crate::cache::{CacheStats, CacheStore};
use crate::error::{DataServiceError, Result};
use crate::models::{DataRequest, ValidatedPayload};
use crate::service::{bounded, DataService};

// == Session ==
/// One consumer's handle on the service.
#[derive(Debug, Clone)]
pub struct Session {
    id: Option<String>,
    service: DataService,
    store: CacheStore,
}

impl Session {
    pub(crate) fn new(service: DataService, store: CacheStore, id: Option<String>) -> Self {
        Self { id, service, store }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    // == Get Data ==
    /// Returns validated data for `request`, from cache when possible.
    ///
    /// Bounded by the configured request timeout, if any.
    pub async fn get_data(&self, request: &DataRequest) -> Result<ValidatedPayload> {
        match self.service.config().request_timeout {
            Some(timeout) => self.get_data_with_timeout(request, timeout).await,
            None => self.service.get_data(&self.store, request).await,
        }
    }

    /// Like [`Session::get_data`] but gives up after `timeout`.
    ///
    /// A fetch already started on this caller's behalf keeps running and its
    /// result is still cached for later requests.
    pub async fn get_data_with_timeout(
        &self,
        request: &DataRequest,
        timeout: Duration,
    ) -> Result<ValidatedPayload> {
        let result = bounded(timeout, self.service.get_data(&self.store, request)).await;
        if let Err(DataServiceError::Timeout { waited }) = &result {
            self.service.record_timeout();
            warn!(session = ?self.id, ?waited, "request timed out");
        }
        result
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.session_stats().await
    }

    /// The cache view backing this session.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Flushes the session tier. Returns the number of entries dropped.
    pub async fn end(self) -> usize {
        match self.id.as_deref() {
            Some(id) => match self.service.end_session(id).await {
                Some(flushed) => flushed,
                None => self.store.flush_session().await,
            },
            None => self.store.flush_session().await,
        }
    }
}

// == Session Registry ==
#[derive(Debug)]
struct Tracked {
    store: CacheStore,
    last_used: Instant,
}

/// Named sessions and when each was last used.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<String, Tracked>>,
}

impl SessionRegistry {
    /// Returns the store for `id`, creating it with `open` if absent, and
    /// marks the session used.
    pub async fn checkout(&self, id: &str, open: impl FnOnce() -> CacheStore) -> CacheStore {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let tracked = sessions.entry(id.to_string()).or_insert_with(|| Tracked {
            store: open(),
            last_used: now,
        });
        tracked.last_used = now;
        tracked.store.clone()
    }

    pub async fn peek(&self, id: &str) -> Option<CacheStore> {
        self.sessions.read().await.get(id).map(|t| t.store.clone())
    }

    pub async fn remove(&self, id: &str) -> Option<CacheStore> {
        self.sessions.write().await.remove(id).map(|t| t.store)
    }

    /// Removes and returns every session unused for longer than `idle`.
    pub async fn take_idle(&self, idle: Duration) -> Vec<(String, CacheStore)> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, t)| now.saturating_duration_since(t.last_used) > idle)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id).map(|t| (id, t.store)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ScoreWeights};

    fn store() -> CacheStore {
        CacheStore::standalone(&CacheConfig::default(), ScoreWeights::default())
    }

    #[tokio::test]
    async fn test_checkout_reuses_store() {
        let registry = SessionRegistry::default();
        let a = registry.checkout("s1", store).await;
        let b = registry.checkout("s1", || panic!("must not reopen")).await;
        assert!(a.same_session(&b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_idle() {
        let registry = SessionRegistry::default();
        registry.checkout("old", store).await;
        tokio::time::advance(Duration::from_secs(100)).await;
        registry.checkout("fresh", store).await;

        let idle = registry.take_idle(Duration::from_secs(50)).await;
        let ids: Vec<_> = idle.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["old".to_string()]);
        assert!(registry.peek("old").await.is_none());
        assert!(registry.peek("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SessionRegistry::default();
        registry.checkout("s1", store).await;
        assert!(registry.remove("s1").await.is_some());
        assert!(registry.remove("s1").await.is_none());
        assert_eq!(registry.len().await, 0);
    }
}
