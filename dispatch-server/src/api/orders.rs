//! Order lifecycle endpoints

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::Deserialize;
use shared::models::{Order, OrderItem};

use super::optional_body;
use crate::auth::Identity;
use crate::error::{ApiResult, ok};
use crate::services::lifecycle;
use crate::state::AppState;

/// POST /orders/{id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Order> {
    ok(lifecycle::accept(&state, id, &identity).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

/// POST /orders/{id}/complete
pub async fn complete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Order> {
    let req: CompleteRequest = optional_body(&body)?;
    ok(lifecycle::complete(&state, id, &identity, &req.photo_urls, chrono::Utc::now()).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// POST /orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Order> {
    let req: CancelRequest = optional_body(&body)?;
    ok(lifecycle::cancel(&state, id, &identity, req.reason.as_deref(), chrono::Utc::now()).await?)
}

/// POST /orders/{id}/items/{item_id}/pick
pub async fn pick_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> ApiResult<OrderItem> {
    ok(lifecycle::pick_item(&state, id, item_id, chrono::Utc::now()).await?)
}
