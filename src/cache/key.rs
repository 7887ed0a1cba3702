//! Cache Key Module
//!
//! Deterministic keys derived from the result-affecting fields of a request.

use std::fmt;

use serde::Serialize;

use crate::models::{DateRange, Frequency, ResourceType};

// == Cache Key ==
/// Opaque, deterministic identifier for one cacheable result.
///
/// Built only from already-normalized parts, so two requests that differ
/// merely in casing, whitespace or how an absent optional field was encoded
/// produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Composes a key as `kind:code:start-end[:fN][:x=EXCHANGE]`.
    pub fn compose(
        resource_type: ResourceType,
        instrument_code: &str,
        date_range: &DateRange,
        frequency: Option<Frequency>,
        exchange: Option<&str>,
    ) -> Self {
        let mut key = format!(
            "{}:{}:{}-{}",
            resource_type.as_str(),
            instrument_code,
            date_range.start.format("%Y%m%d"),
            date_range.end.format("%Y%m%d"),
        );
        if let Some(freq) = frequency {
            key.push_str(&format!(":f{}", freq.minutes()));
        }
        if let Some(exchange) = exchange {
            key.push_str(":x=");
            key.push_str(exchange);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
