//! Supplier payables: payments and derived balances

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use shared::models::{CreateSupplierPayment, PayableLine, SupplierBalance, SupplierPayment};
use std::collections::BTreeSet;

use super::Pagination;
use crate::auth::Identity;
use crate::db;
use crate::error::{ApiResult, ok};
use crate::ledger;
use crate::services::payables;
use crate::state::AppState;

/// POST /admin/supplier-payments
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateSupplierPayment>,
) -> ApiResult<SupplierPayment> {
    ok(payables::create_payment(&state, &req, &identity.operator()).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub supplier_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentPage {
    pub payments: Vec<SupplierPayment>,
    pub total: i64,
}

/// GET /admin/supplier-payments
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaymentPage> {
    let (limit, offset) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .limit_offset();
    let (payments, total) =
        db::supplier_payments::list(&state.pool, query.supplier_id, limit, offset).await?;
    ok(PaymentPage { payments, total })
}

/// Per-supplier balances over every payable line
pub fn balances(lines: &[PayableLine]) -> Vec<SupplierBalance> {
    let suppliers: BTreeSet<i64> = lines.iter().filter_map(|l| l.supplier_id).collect();
    suppliers
        .into_iter()
        .map(|id| ledger::balance(id, lines))
        .collect()
}

/// GET /admin/supplier-payments/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Vec<SupplierBalance>> {
    let lines = db::supplier_payments::all_lines(&state.pool).await?;
    ok(balances(&lines))
}

#[derive(Debug, Serialize)]
pub struct SupplierDetail {
    #[serde(flatten)]
    pub balance: SupplierBalance,
    pub items: Vec<PayableItem>,
}

#[derive(Debug, Serialize)]
pub struct PayableItem {
    #[serde(flatten)]
    pub line: PayableLine,
    pub subtotal: rust_decimal::Decimal,
    pub is_paid: bool,
}

/// GET /admin/supplier-payments/{id}/detail, where `id` is the supplier
pub async fn detail(
    State(state): State<AppState>,
    Path(supplier_id): Path<i64>,
) -> ApiResult<SupplierDetail> {
    let lines = db::supplier_payments::supplier_lines(&state.pool, supplier_id).await?;
    let balance = ledger::balance(supplier_id, &lines);
    let items = lines
        .into_iter()
        .map(|line| PayableItem {
            subtotal: line.amount(),
            is_paid: line.is_paid(),
            line,
        })
        .collect();
    ok(SupplierDetail { balance, items })
}

/// POST /admin/supplier-payments/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SupplierPayment> {
    ok(payables::cancel_payment(&state, id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(id: i64, supplier: i64, qty: i32, paid: bool) -> PayableLine {
        PayableLine {
            order_item_id: id,
            order_id: 1,
            order_number: "P202503010800000001000001".into(),
            supplier_id: Some(supplier),
            product_id: id,
            product_name: format!("item {id}"),
            spec_name: "box".into(),
            quantity: qty,
            cost_price: dec!(10),
            payment_id: paid.then_some(9),
        }
    }

    #[test]
    fn balances_group_by_supplier() {
        let lines = vec![line(1, 3, 2, true), line(2, 3, 1, false), line(3, 5, 4, false)];
        let all = balances(&lines);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].supplier_id, 3);
        assert_eq!(all[0].total_amount, dec!(30));
        assert_eq!(all[0].paid_amount, dec!(20));
        assert_eq!(all[0].pending_amount, dec!(10));
        assert_eq!(all[1].supplier_id, 5);
        assert_eq!(all[1].pending_item_count, 1);
    }
}
