//! Fetch Module
//!
//! Everything between a cache miss and a raw provider table: the provider
//! contract, backoff, the fallback chain and the executor driving them.

mod backoff;
mod executor;
mod fallback;
mod provider;
mod synthetic;

pub use executor::{FetchExecutor, Fetched, FetchedData, PayloadSource};
pub use fallback::{FallbackStep, NoStaleData, StaleLookup};
pub use provider::{DataProvider, FetchOperation, FetchParams};
pub use synthetic::SyntheticProvider;
