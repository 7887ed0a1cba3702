//! Single-flight table
//!
//! At most one fetch per cache key is in progress at any time. The first
//! caller to miss starts it; later callers subscribe to the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::cache::{CacheKey, CacheStore};
use crate::error::{DataServiceError, Result};
use crate::models::ValidatedPayload;

/// What a finished fetch hands to every waiter.
#[derive(Debug, Clone)]
pub(crate) struct Delivered {
    pub payload: ValidatedPayload,
    pub cost: Duration,
    /// False for stale-cache results, which must not be cached again
    pub admissible: bool,
}

pub(crate) type Outcome = Option<Result<Delivered>>;

#[derive(Debug)]
struct Flight {
    rx: watch::Receiver<Outcome>,
    /// Store of the caller that started the fetch; it receives the admission
    origin: CacheStore,
}

/// Handle a caller uses to wait for a fetch.
#[derive(Debug)]
pub(crate) struct Subscription {
    rx: watch::Receiver<Outcome>,
    origin: CacheStore,
}

impl Subscription {
    /// Store the fetch result was admitted into.
    pub fn origin(&self) -> &CacheStore {
        &self.origin
    }

    /// Waits for the fetch to finish.
    ///
    /// Dropping the returned future stops waiting but leaves the fetch running.
    pub async fn outcome(mut self) -> Result<Delivered> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone().unwrap_or_else(|| Err(aborted())),
            Err(_) => Err(aborted()),
        }
    }
}

fn aborted() -> DataServiceError {
    DataServiceError::DataUnavailable {
        cause: "fetch task ended without a result".to_string(),
    }
}

/// Whether the caller joined an existing fetch or must start one.
pub(crate) enum Join {
    Follower(Subscription),
    Leader(Subscription, watch::Sender<Outcome>),
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    flights: Mutex<HashMap<CacheKey, Flight>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the fetch for `key`, registering a new one when none is running.
    ///
    /// `recheck` is awaited under the table lock only when a new fetch would
    /// be registered; yielding `Some` means the data arrived after the
    /// caller's lookup and no fetch is needed.
    pub async fn join<T>(
        &self,
        key: &CacheKey,
        store: &CacheStore,
        recheck: impl Future<Output = Option<T>>,
    ) -> JoinOr<T> {
        let mut flights = self.flights.lock().await;
        if let Some(flight) = flights.get(key) {
            return JoinOr::Joined(Join::Follower(Subscription {
                rx: flight.rx.clone(),
                origin: flight.origin.clone(),
            }));
        }

        if let Some(found) = recheck.await {
            return JoinOr::Ready(found);
        }

        let (tx, rx) = watch::channel(None);
        flights.insert(
            key.clone(),
            Flight {
                rx: rx.clone(),
                origin: store.clone(),
            },
        );
        JoinOr::Joined(Join::Leader(
            Subscription {
                rx,
                origin: store.clone(),
            },
            tx,
        ))
    }

    /// Retires the fetch for `key`. Called once its result is cached.
    pub async fn finish(&self, key: &CacheKey) {
        self.flights.lock().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.flights.lock().await.len()
    }
}

pub(crate) enum JoinOr<T> {
    Joined(Join),
    Ready(T),
}
