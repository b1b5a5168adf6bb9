//! Health check endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Basic health check (is the server running?)
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    valid: bool,
    checked_at: i64,
}

/// Readiness check (is the node in a valid segment right now?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadyResponse>) {
    let report = state.coordinator.check().await;

    let (code, status) = if report.valid {
        (StatusCode::OK, "ready")
    } else {
        // 503 takes the node out of rotation
        (StatusCode::SERVICE_UNAVAILABLE, "segmented")
    };

    (
        code,
        Json(ReadyResponse {
            status,
            valid: report.valid,
            checked_at: report.checked_at,
        }),
    )
}
