//! Dispatch view of rider positions

use axum::extract::{Path, State};
use shared::error::{AppError, ErrorCode};
use shared::models::RiderLocation;

use crate::error::{ApiResult, ok};
use crate::live::RiderStatus;
use crate::state::AppState;

/// GET /admin/riders/locations
///
/// Every known rider with liveness and connection flags.
pub async fn locations(State(state): State<AppState>) -> ApiResult<Vec<RiderStatus>> {
    ok(state.riders.statuses(chrono::Utc::now()))
}

/// GET /admin/riders/{rider_id}/location
///
/// 404 once the last position is older than the liveness window.
pub async fn location(
    State(state): State<AppState>,
    Path(rider_id): Path<i64>,
) -> ApiResult<RiderLocation> {
    match state.riders.latest(rider_id, chrono::Utc::now()) {
        Some(location) => ok(location),
        None => Err(AppError::with_message(
            ErrorCode::RiderNotFound,
            format!("No live position for rider {rider_id}"),
        )
        .into()),
    }
}
