//! Commission month recalculation

use serde::Serialize;

use crate::commission;
use crate::db;
use crate::error::ServiceResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RecalculateSummary {
    pub employee_code: String,
    pub month: String,
    pub applied_tier: u8,
    pub updated_rows: usize,
}

/// Re-tier every valid row of a salesperson's month from its final volume
pub async fn recalculate_month(
    state: &AppState,
    employee_code: &str,
    month: &str,
) -> ServiceResult<RecalculateSummary> {
    let month = commission::parse_month(month)?;
    let mut tx = state.pool.begin().await?;
    let config = db::commissions::config_or_default(&mut *tx, employee_code).await?;
    let rows = db::commissions::month_rows(&mut tx, employee_code, &month, true).await?;
    let (applied_tier, _) = commission::tier_for(commission::month_volume(&rows), &config);
    let adjustments = commission::recalculate_month(&rows, &config);
    db::commissions::apply_adjustments(&mut tx, &adjustments).await?;
    tx.commit().await?;

    tracing::info!(
        employee_code,
        month = %month,
        tier = applied_tier,
        updated = adjustments.len(),
        "Commission month recalculated"
    );
    Ok(RecalculateSummary {
        employee_code: employee_code.to_string(),
        month,
        applied_tier,
        updated_rows: adjustments.len(),
    })
}
