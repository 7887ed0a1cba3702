//! Error types for the data service
//!
//! Provides unified error handling using thiserror. Every error a consumer
//! can observe is a [`DataServiceError`]; transient provider failures are
//! [`FetchFailure`]s and never leave the fetch executor on their own.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::ErrorResponse;

// == Validation Error ==
/// Data-quality failures. The offending payload is discarded and never cached.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Payload lacks one or more columns required for its resource type
    #[error("Missing required fields for {resource}: {}", .fields.join(", "))]
    MissingRequiredFields {
        resource: String,
        fields: Vec<String>,
    },

    /// Too many null cells across the required columns
    #[error("Null ratio {ratio:.3} exceeds threshold {threshold:.3}")]
    ExcessiveNullRatio { ratio: f64, threshold: f64 },
}

// == Fetch Failure ==
/// Failure reported by a provider for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Provider quota exhausted; retried with backoff
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport failure; triggers the fallback chain
    #[error("Network error: {0}")]
    Network(String),

    /// Provider rejected or could not serve the call
    #[error("Provider error: {0}")]
    Provider(String),
}

// == Data Service Error ==
/// Unified error type returned to consumers.
///
/// `Clone` so a single fetch outcome can be handed to every caller waiting
/// on the same key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataServiceError {
    /// Request fields are malformed or inconsistent
    #[error("Invalid request parameters: {0}")]
    InvalidRequestParameters(String),

    /// Request names a resource kind the service does not serve
    #[error("Unsupported request kind: {0}")]
    UnsupportedRequestKind(String),

    /// Fetched payload failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Provider kept rate limiting and no fallback produced data
    #[error("Max retries exceeded after {attempts} attempts: {cause}")]
    MaxRetriesExceeded { attempts: u32, cause: FetchFailure },

    /// Every recovery step failed
    #[error("Data unavailable: {cause}")]
    DataUnavailable { cause: String },

    /// Caller stopped waiting; the in-flight fetch keeps running for others
    #[error("Timed out after {waited:?}")]
    Timeout { waited: Duration },

    /// No session is registered under the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

// == Error Kind ==
/// Stable classification the orchestration layer can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequestParameters,
    UnsupportedRequestKind,
    MissingRequiredFields,
    ExcessiveNullRatio,
    MaxRetriesExceeded,
    DataUnavailable,
    Timeout,
    SessionNotFound,
}

impl DataServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataServiceError::InvalidRequestParameters(_) => ErrorKind::InvalidRequestParameters,
            DataServiceError::UnsupportedRequestKind(_) => ErrorKind::UnsupportedRequestKind,
            DataServiceError::Validation(ValidationError::MissingRequiredFields { .. }) => {
                ErrorKind::MissingRequiredFields
            }
            DataServiceError::Validation(ValidationError::ExcessiveNullRatio { .. }) => {
                ErrorKind::ExcessiveNullRatio
            }
            DataServiceError::MaxRetriesExceeded { .. } => ErrorKind::MaxRetriesExceeded,
            DataServiceError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            DataServiceError::Timeout { .. } => ErrorKind::Timeout,
            DataServiceError::SessionNotFound(_) => ErrorKind::SessionNotFound,
        }
    }

    /// True when the request itself was at fault and retrying cannot help.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            DataServiceError::InvalidRequestParameters(_)
                | DataServiceError::UnsupportedRequestKind(_)
                | DataServiceError::SessionNotFound(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for DataServiceError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::InvalidRequestParameters | ErrorKind::UnsupportedRequestKind => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::MissingRequiredFields | ErrorKind::ExcessiveNullRatio => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::MaxRetriesExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::DataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::SessionNotFound => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse::new(self.to_string(), self.kind()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the data service.
pub type Result<T> = std::result::Result<T, DataServiceError>;
