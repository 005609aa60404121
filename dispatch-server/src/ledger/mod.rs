//! Supplier Payables Ledger
//!
//! Balances are derived, never stored: the picked, uncancelled order lines
//! of a supplier are what is owed, and the lines covered by an active
//! payment are what is paid.

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{CreateSupplierPayment, PayableLine, SupplierBalance};
use std::collections::HashSet;
use thiserror::Error;

use crate::pricing::round_money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("payment has no items")]
    EmptyPayment,
    #[error("order item {0} listed twice")]
    DuplicateItem(i64),
    #[error("order item {0} is not a picked line of a live order")]
    NotPayable(i64),
    #[error("order item {order_item_id} belongs to another supplier")]
    SupplierMismatch { order_item_id: i64 },
    #[error("order item {0} is already paid")]
    ItemAlreadyPaid(i64),
    #[error("amount {submitted} does not match items total {expected}")]
    AmountMismatch { expected: Decimal, submitted: Decimal },
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        let message = e.to_string();
        match e {
            LedgerError::EmptyPayment | LedgerError::DuplicateItem(_) => {
                AppError::validation(message)
            }
            LedgerError::NotPayable(id) => {
                AppError::with_message(ErrorCode::OrderItemNotFound, message)
                    .with_detail("order_item_id", id)
            }
            LedgerError::SupplierMismatch { order_item_id } => {
                AppError::with_message(ErrorCode::SupplierMismatch, message)
                    .with_detail("order_item_id", order_item_id)
            }
            LedgerError::ItemAlreadyPaid(id) => {
                AppError::with_message(ErrorCode::ItemAlreadyPaid, message)
                    .with_detail("order_item_id", id)
            }
            LedgerError::AmountMismatch { expected, .. } => {
                AppError::with_message(ErrorCode::AmountMismatch, message)
                    .with_detail("expected", expected.to_string())
            }
        }
    }
}

/// Owed, paid and pending totals for one supplier's lines
pub fn balance(supplier_id: i64, lines: &[PayableLine]) -> SupplierBalance {
    let mut b = SupplierBalance {
        supplier_id,
        ..Default::default()
    };
    for line in lines.iter().filter(|l| l.supplier_id == Some(supplier_id)) {
        let amount = line.amount();
        b.total_amount += amount;
        b.item_count += 1;
        if line.is_paid() {
            b.paid_amount += amount;
        } else {
            b.pending_item_count += 1;
        }
    }
    b.total_amount = round_money(b.total_amount);
    b.paid_amount = round_money(b.paid_amount);
    b.pending_amount = b.total_amount - b.paid_amount;
    b
}

/// Check a payment request against the current state of its lines
///
/// `lines` are the payable lines for the requested item ids, read under
/// lock. Returns the lines to attach to the payment.
pub fn validate_payment<'a>(
    req: &CreateSupplierPayment,
    lines: &'a [PayableLine],
) -> Result<Vec<&'a PayableLine>, LedgerError> {
    if req.order_item_ids.is_empty() {
        return Err(LedgerError::EmptyPayment);
    }
    let mut seen = HashSet::new();
    let mut picked = Vec::with_capacity(req.order_item_ids.len());
    for id in &req.order_item_ids {
        if !seen.insert(*id) {
            return Err(LedgerError::DuplicateItem(*id));
        }
        let line = lines
            .iter()
            .find(|l| l.order_item_id == *id)
            .ok_or(LedgerError::NotPayable(*id))?;
        if line.supplier_id != Some(req.supplier_id) {
            return Err(LedgerError::SupplierMismatch { order_item_id: *id });
        }
        if line.is_paid() {
            return Err(LedgerError::ItemAlreadyPaid(*id));
        }
        picked.push(line);
    }

    let expected = round_money(picked.iter().map(|l| l.amount()).sum());
    let submitted = round_money(req.amount);
    if expected != submitted {
        return Err(LedgerError::AmountMismatch {
            expected,
            submitted,
        });
    }
    Ok(picked)
}

/// First requested line already covered by an active payment
pub fn first_paid(order_item_ids: &[i64], lines: &[PayableLine]) -> Option<i64> {
    order_item_ids
        .iter()
        .copied()
        .find(|id| lines.iter().any(|l| l.order_item_id == *id && l.is_paid()))
}
