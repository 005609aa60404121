//! Commission ledger and per-salesperson configuration

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::{CommissionConfig, CommissionMonthlyStats, SalesCommission};

use crate::commission;
use crate::db::{self, commissions::AccountingAction};
use crate::error::{ApiResult, ok};
use crate::services::commissions::{self as recalc, RecalculateSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub employee_code: Option<String>,
    pub month: Option<String>,
}

/// GET /admin/commissions?employee_code=&month=YYYY-MM
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<Vec<SalesCommission>> {
    let month = query.month.as_deref().map(commission::parse_month).transpose()?;
    ok(db::commissions::list(&state.pool, query.employee_code.as_deref(), month.as_deref()).await?)
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub employee_code: String,
    pub month: String,
}

/// GET /admin/commissions/stats?employee_code=&month=
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<CommissionMonthlyStats> {
    let month = commission::parse_month(&query.month)?;
    let mut conn = state.pool.acquire().await?;
    let rows = db::commissions::month_rows(&mut conn, &query.employee_code, &month, false).await?;
    ok(commission::monthly_stats(&query.employee_code, &month, &rows))
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct AccountingResult {
    pub updated: u64,
}

async fn apply(state: &AppState, action: AccountingAction, ids: &[i64]) -> ApiResult<AccountingResult> {
    if ids.is_empty() {
        return Err(AppError::validation("ids must not be empty").into());
    }
    let updated = db::commissions::apply_accounting(&state.pool, action, ids).await?;
    tracing::info!(?action, requested = ids.len(), updated, "Commission accounting applied");
    ok(AccountingResult { updated })
}

/// POST /admin/commissions/account
pub async fn account(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<AccountingResult> {
    apply(&state, AccountingAction::Account, &req.ids).await
}

/// POST /admin/commissions/settle
pub async fn settle(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<AccountingResult> {
    apply(&state, AccountingAction::Settle, &req.ids).await
}

/// POST /admin/commissions/cancel-account
pub async fn cancel_account(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<AccountingResult> {
    apply(&state, AccountingAction::CancelAccount, &req.ids).await
}

/// POST /admin/commissions/recalculate
pub async fn recalculate(
    State(state): State<AppState>,
    Json(req): Json<MonthQuery>,
) -> ApiResult<RecalculateSummary> {
    ok(recalc::recalculate_month(&state, &req.employee_code, &req.month).await?)
}

#[derive(Debug, Deserialize)]
pub struct ConfigQuery {
    pub employee_code: String,
}

/// GET /admin/commission-config?employee_code=
pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> ApiResult<CommissionConfig> {
    ok(db::commissions::config_or_default(&state.pool, &query.employee_code).await?)
}

/// POST /admin/commission-config
pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<CommissionConfig>,
) -> ApiResult<CommissionConfig> {
    commission::validate_config(&config)?;
    db::commissions::upsert_config(&state.pool, &config).await?;
    tracing::info!(employee_code = %config.employee_code, "Commission config updated");
    ok(config)
}
