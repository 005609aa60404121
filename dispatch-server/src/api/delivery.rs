//! Rider income views and delivery-fee settlement

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use shared::models::{DeliveryIncomeRow, DeliveryIncomeStats, DeliverySettleRequest};

use super::Pagination;
use crate::auth::Identity;
use crate::db;
use crate::error::{ApiResult, ok};
use crate::state::AppState;

/// GET /delivery/income
pub async fn income(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<DeliveryIncomeStats> {
    let code = identity.require_code()?;
    ok(db::orders::income_stats(&state.pool, code).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailsQuery {
    pub settled: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// GET /delivery/income/details
pub async fn income_details(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<DetailsQuery>,
) -> ApiResult<Vec<DeliveryIncomeRow>> {
    let code = identity.require_code()?;
    let (limit, offset) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .limit_offset();
    ok(db::orders::income_rows(&state.pool, code, query.settled, limit, offset).await?)
}

#[derive(Debug, Serialize)]
pub struct SettleResult {
    pub settled_orders: u64,
}

/// POST /admin/delivery/settle
pub async fn settle(
    State(state): State<AppState>,
    Json(req): Json<DeliverySettleRequest>,
) -> ApiResult<SettleResult> {
    let settled_orders = db::orders::settle_delivery_fees(
        &state.pool,
        &req.employee_code,
        &req.order_ids,
        req.settlement_date,
    )
    .await?;
    tracing::info!(
        employee_code = %req.employee_code,
        settlement_date = %req.settlement_date,
        settled_orders,
        "Delivery fees settled"
    );
    ok(SettleResult { settled_orders })
}
