//! API Routes
//!
//! Configures the Axum router with all data service endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    data_handler, end_session_handler, flush_hot_handler, health_handler, session_stats_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /sessions/:id/data` - Serve a data request within a session
/// - `GET /sessions/:id/stats` - Session tier statistics
/// - `DELETE /sessions/:id` - End a session and flush its tier
/// - `DELETE /cache/hot` - Flush the hot tier
/// - `GET /stats` - Hot tier and service statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sessions/:id/data", post(data_handler))
        .route("/sessions/:id/stats", get(session_stats_handler))
        .route("/sessions/:id", delete(end_session_handler))
        .route("/cache/hot", delete(flush_hot_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetch::SyntheticProvider;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::from_config(&Config::default(), Arc::new(SyntheticProvider::new()));
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_flush_hot_endpoint() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache/hot")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .uri("/sessions/missing/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
