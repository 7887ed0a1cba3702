//! Market Data Cache - caching and fetch orchestration for financial time series
//!
//! Sits between many concurrent consumers and a quota-limited remote data
//! provider: a per-session LRU tier and a shared, priority-evicted hot tier
//! absorb repeat requests, concurrent misses share one fetch, rate limits are
//! retried with backoff, and nothing is cached before it passes validation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod router;
pub mod service;
pub mod tasks;
pub mod validator;

pub use api::AppState;
pub use config::Config;
pub use error::{DataServiceError, ErrorKind, Result};
pub use service::{DataService, Session};
pub use tasks::spawn_reaper_task;
