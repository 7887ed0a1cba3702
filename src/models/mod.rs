//! Data model for the service
//!
//! Requests issued by consumers, the payloads flowing between provider,
//! validator and cache, and the DTOs used by the HTTP API.

pub mod payload;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use payload::{RawPayload, ValidatedPayload};
pub use requests::{DataRequest, DateRange, Frequency, ResourceType};
pub use responses::{
    DataResponse, ErrorResponse, FlushResponse, HealthResponse, ServiceStatsResponse,
    SessionStatsResponse, TierStatsResponse,
};
