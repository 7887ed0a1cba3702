//! API Handlers
//!
//! HTTP request handlers for each data service endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::config::Config;
use crate::error::{DataServiceError, Result};
use crate::fetch::DataProvider;
use crate::models::{
    DataRequest, DataResponse, FlushResponse, HealthResponse, ServiceStatsResponse,
    SessionStatsResponse,
};
use crate::service::DataService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: DataService,
}

impl AppState {
    pub fn new(service: DataService) -> Self {
        Self { service }
    }

    /// Builds the service from configuration around the given provider.
    pub fn from_config(config: &Config, provider: std::sync::Arc<dyn DataProvider>) -> Self {
        Self::new(DataService::new(config.clone(), provider))
    }
}

/// Handler for POST /sessions/:id/data
///
/// Serves one data request within the named session, opening it on first use.
pub async fn data_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<DataRequest>,
) -> Result<Json<DataResponse>> {
    if session_id.trim().is_empty() {
        return Err(DataServiceError::InvalidRequestParameters(
            "session id cannot be empty".to_string(),
        ));
    }

    let session = state.service.session(&session_id).await;
    let payload = session.get_data(&request).await?;
    debug!(session = %session_id, rows = payload.row_count(), "data request served");

    Ok(Json(DataResponse::new(session_id, &payload)))
}

/// Handler for GET /sessions/:id/stats
pub async fn session_stats_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatsResponse>> {
    let session = state
        .service
        .existing_session(&session_id)
        .await
        .ok_or_else(|| DataServiceError::SessionNotFound(session_id.clone()))?;

    Ok(Json(SessionStatsResponse::new(session_id, session.stats().await)))
}

/// Handler for DELETE /sessions/:id
///
/// Ends the session and flushes its session tier.
pub async fn end_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<FlushResponse>> {
    let flushed = state
        .service
        .end_session(&session_id)
        .await
        .ok_or_else(|| DataServiceError::SessionNotFound(session_id.clone()))?;

    Ok(Json(FlushResponse::new(
        format!("Session '{}' ended", session_id),
        flushed,
    )))
}

/// Handler for DELETE /cache/hot
pub async fn flush_hot_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let flushed = state.service.flush_hot().await;
    Json(FlushResponse::new("Hot tier flushed", flushed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<ServiceStatsResponse> {
    let hot = state.service.hot_stats().await;
    let service = state.service.stats().await;
    Json(ServiceStatsResponse::new(hot, service))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SyntheticProvider;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::from_config(&Config::default(), Arc::new(SyntheticProvider::new()))
    }

    fn request() -> DataRequest {
        DataRequest::daily_bar(
            "600519.SH",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_data_then_stats_handler() {
        let state = state();

        let response = data_handler(
            State(state.clone()),
            Path("s1".to_string()),
            Json(request()),
        )
        .await
        .unwrap();
        assert_eq!(response.session, "s1");
        assert_eq!(response.row_count, 23);

        let stats = session_stats_handler(State(state), Path("s1".to_string()))
            .await
            .unwrap();
        assert_eq!(stats.session_tier.stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_stats() {
        let result = session_stats_handler(State(state()), Path("nope".to_string())).await;
        assert!(matches!(result, Err(DataServiceError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_end_session_handler() {
        let state = state();
        data_handler(State(state.clone()), Path("s1".to_string()), Json(request()))
            .await
            .unwrap();

        let response = end_session_handler(State(state.clone()), Path("s1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.flushed, 1);

        let again = end_session_handler(State(state), Path("s1".to_string())).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_empty_session_id_rejected() {
        let result = data_handler(State(state()), Path(" ".to_string()), Json(request())).await;
        assert!(matches!(
            result,
            Err(DataServiceError::InvalidRequestParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
