//! Segmentation report endpoint.

use axum::{Json, extract::State};
use segwatch_common::SegmentReport;

use crate::state::AppState;

/// Run a fresh check and return every resolver's contribution
pub async fn segment_report(State(state): State<AppState>) -> Json<SegmentReport> {
    let report = state.coordinator.check().await;

    tracing::debug!(
        valid = report.valid,
        resolvers = report.resolvers.len(),
        "Segment report served"
    );

    Json(report)
}
