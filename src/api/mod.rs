//! API Module
//!
//! HTTP handlers and routing for the data service REST API.
//!
//! # Endpoints
//! - `POST /sessions/:id/data` - Serve a data request within a session
//! - `GET /sessions/:id/stats` - Session tier statistics
//! - `DELETE /sessions/:id` - End a session
//! - `DELETE /cache/hot` - Flush the hot tier
//! - `GET /stats` - Hot tier and service statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
