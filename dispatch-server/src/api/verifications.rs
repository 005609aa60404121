//! Payment verification requests

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use shared::models::PaymentVerificationRequest;

use super::optional_body;
use crate::auth::Identity;
use crate::error::{ApiResult, ok};
use crate::services::lifecycle;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FileRequest {
    pub voucher_url: Option<String>,
    pub remark: Option<String>,
}

/// POST /orders/{id}/payment-verifications
pub async fn file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<i64>,
    body: Bytes,
) -> ApiResult<PaymentVerificationRequest> {
    let req: FileRequest = optional_body(&body)?;
    ok(lifecycle::file_verification(
        &state,
        order_id,
        &identity,
        req.voucher_url.as_deref(),
        req.remark.as_deref(),
    )
    .await?)
}

/// POST /admin/payment-verifications/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<PaymentVerificationRequest> {
    ok(lifecycle::approve_verification(&state, id, &identity, chrono::Utc::now()).await?)
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// POST /admin/payment-verifications/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<PaymentVerificationRequest> {
    ok(lifecycle::reject_verification(&state, id, &identity, &req.reason, chrono::Utc::now()).await?)
}
