//! Transactional orchestration over the pure core and `db`
//!
//! Every mutating operation on an order row-locks it first, so state
//! changes on one order are serialized.

pub mod checkout;
pub mod commissions;
pub mod lifecycle;
pub mod payables;
pub mod settlement;

use shared::error::{AppError, ErrorCode};

pub(crate) fn order_not_found(id: impl std::fmt::Display) -> AppError {
    AppError::with_message(ErrorCode::OrderNotFound, format!("Order {id} not found"))
        .with_detail("order", id.to_string())
}
