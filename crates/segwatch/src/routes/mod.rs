//! HTTP route handlers for Segwatch.

use axum::{Router, http::StatusCode, routing::get};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod segment;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();

    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Full segmentation report
        .route("/segment", get(segment::segment_report))

        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))

        // Add shared state
        .with_state(state)
}
