//! Axum router configuration for all endpoints

use axum::{
  middleware,
  routing::{get, post},
  Router,
};

use crate::server::handlers::{search, status};
use crate::server::middleware::request_context_middleware;
use crate::server::state::AppState;

/// Create the application router over shared state
pub fn create_router(state: AppState) -> Router {
  Router::new()
    // Status and version endpoints
    .route("/status", get(status::status))
    .route("/version", get(status::version))
    .route("/corpus/stats", get(status::corpus_stats))
    // Search
    .route("/search", post(search::search))
    .layer(middleware::from_fn(request_context_middleware))
    .with_state(state)
}
