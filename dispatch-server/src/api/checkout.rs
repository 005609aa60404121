//! Checkout endpoints

use axum::extract::State;
use axum::{Extension, Json};

use crate::auth::Identity;
use crate::error::{ApiResult, ok};
use crate::services::checkout::{self, CheckoutRequest, CreatedOrder, PrepayResponse};
use crate::state::AppState;

/// POST /cart/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<CreatedOrder> {
    ok(checkout::create_cod_order(&state, identity.id, &req, chrono::Utc::now()).await?)
}

/// POST /prepay
pub async fn prepay(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<PrepayResponse> {
    ok(checkout::prepay(&state, identity.id, &req, chrono::Utc::now()).await?)
}
