//! Supplier Payables Ledger writes

use shared::error::{AppError, ErrorCode};
use shared::models::{CreateSupplierPayment, SupplierPayment, SupplierPaymentStatus};

use crate::db;
use crate::error::ServiceResult;
use crate::ledger::{self, LedgerError};
use crate::state::AppState;

fn payment_not_found(id: i64) -> AppError {
    AppError::new(ErrorCode::SupplierPaymentNotFound).with_detail("payment_id", id)
}

/// Record a payment over picked lines; all or nothing
pub async fn create_payment(
    state: &AppState,
    req: &CreateSupplierPayment,
    created_by: &str,
) -> ServiceResult<SupplierPayment> {
    let mut tx = state.pool.begin().await?;
    let lines = db::supplier_payments::lock_payable_lines(&mut tx, &req.order_item_ids).await?;
    let chosen = ledger::validate_payment(req, &lines)?;

    let payment_id = match db::supplier_payments::insert(&mut tx, req, &chosen, created_by).await {
        Ok(id) => id,
        // a concurrent payment claimed one of the lines first
        Err(e) if db::is_unique_violation(&e) => {
            let lines =
                db::supplier_payments::lock_payable_lines(&mut tx, &req.order_item_ids).await?;
            let Some(paid) = ledger::first_paid(&req.order_item_ids, &lines) else {
                return Err(e.into());
            };
            return Err(LedgerError::ItemAlreadyPaid(paid).into());
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    tracing::info!(
        payment_id,
        supplier_id = req.supplier_id,
        amount = %req.amount,
        items = chosen.len(),
        "Supplier payment recorded"
    );
    Ok(db::supplier_payments::get(&state.pool, payment_id)
        .await?
        .ok_or_else(|| payment_not_found(payment_id))?)
}

/// Cancel a payment; its lines fall back to pending
pub async fn cancel_payment(state: &AppState, id: i64) -> ServiceResult<SupplierPayment> {
    let mut tx = state.pool.begin().await?;
    match db::supplier_payments::lock_status(&mut tx, id).await? {
        None => return Err(payment_not_found(id).into()),
        Some(SupplierPaymentStatus::Cancelled) => {
            return Err(AppError::new(ErrorCode::SupplierPaymentCancelled)
                .with_detail("payment_id", id)
                .into());
        }
        Some(SupplierPaymentStatus::Active) => {}
    }
    db::supplier_payments::cancel(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(payment_id = id, "Supplier payment cancelled");
    Ok(db::supplier_payments::get(&state.pool, id)
        .await?
        .ok_or_else(|| payment_not_found(id))?)
}
