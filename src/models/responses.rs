//! Response DTOs for the data service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::error::ErrorKind;
use crate::models::{ResourceType, ValidatedPayload};
use crate::service::ServiceStats;

/// Response body for POST /sessions/:id/data
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub session: String,
    pub resource_type: ResourceType,
    pub row_count: usize,
    pub size_bytes: usize,
    pub fields: Vec<String>,
    pub items: Vec<Vec<Value>>,
}

impl DataResponse {
    pub fn new(session: impl Into<String>, payload: &ValidatedPayload) -> Self {
        Self {
            session: session.into(),
            resource_type: payload.resource_type(),
            row_count: payload.row_count(),
            size_bytes: payload.size_bytes(),
            fields: payload.fields().to_vec(),
            items: payload.rows().to_vec(),
        }
    }
}

/// Statistics of one cache tier, with derived ratios.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// total_bytes / budget_bytes
    pub utilization: f64,
}

impl From<CacheStats> for TierStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            utilization: stats.utilization(),
            stats,
        }
    }
}

/// Response body for GET /sessions/:id/stats
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatsResponse {
    pub session: String,
    pub session_tier: TierStatsResponse,
}

impl SessionStatsResponse {
    pub fn new(session: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            session: session.into(),
            session_tier: stats.into(),
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatsResponse {
    pub hot_tier: TierStatsResponse,
    pub service: ServiceStats,
}

impl ServiceStatsResponse {
    pub fn new(hot: CacheStats, service: ServiceStats) -> Self {
        Self {
            hot_tier: hot.into(),
            service,
        }
    }
}

/// Response body for DELETE /sessions/:id and DELETE /cache/hot
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    /// Success message
    pub message: String,
    /// Entries dropped by the flush
    pub flushed: usize,
}

impl FlushResponse {
    pub fn new(message: impl Into<String>, flushed: usize) -> Self {
        Self {
            message: message.into(),
            flushed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
    /// Stable classification of the error
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}
