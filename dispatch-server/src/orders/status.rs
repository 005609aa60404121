//! Order state machine
//!
//! pending_delivery → delivering → delivered → paid, with cancellation
//! from the two pre-delivery states. Everything else is illegal.

use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::with_message(ErrorCode::IllegalTransition, e.to_string())
            .with_detail("from", e.from.as_str())
            .with_detail("to", e.to.as_str())
    }
}

/// Lifecycle triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Rider takes the order
    Accept,
    /// Rider hands it over
    Complete,
    /// Settlement approval or payment callback
    MarkPaid,
    /// Admin or customer cancel
    Cancel,
}

impl OrderAction {
    pub fn target(self) -> OrderStatus {
        match self {
            Self::Accept => OrderStatus::Delivering,
            Self::Complete => OrderStatus::Delivered,
            Self::MarkPaid => OrderStatus::Paid,
            Self::Cancel => OrderStatus::Cancelled,
        }
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (PendingDelivery, Delivering)
            | (Delivering, Delivered)
            | (Delivered, Paid)
            | (PendingDelivery, Cancelled)
            | (Delivering, Cancelled)
    )
}

/// Validate `action` against the current status and return the new status
pub fn apply(from: OrderStatus, action: OrderAction) -> Result<OrderStatus, TransitionError> {
    let to = action.target();
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(TransitionError { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 5] = [PendingDelivery, Delivering, Delivered, Paid, Cancelled];

    #[test]
    fn happy_path() {
        let s = apply(PendingDelivery, OrderAction::Accept).unwrap();
        let s = apply(s, OrderAction::Complete).unwrap();
        let s = apply(s, OrderAction::MarkPaid).unwrap();
        assert_eq!(s, Paid);
    }

    #[test]
    fn exactly_five_edges_are_legal() {
        let legal: Vec<_> = ALL
            .iter()
            .flat_map(|f| ALL.iter().map(move |t| (*f, *t)))
            .filter(|(f, t)| can_transition(*f, *t))
            .collect();
        assert_eq!(legal.len(), 5);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!can_transition(Paid, to));
            assert!(!can_transition(Cancelled, to));
        }
    }

    #[test]
    fn paid_requires_delivery() {
        assert!(apply(PendingDelivery, OrderAction::MarkPaid).is_err());
        assert!(apply(Delivering, OrderAction::MarkPaid).is_err());
    }

    #[test]
    fn delivered_cannot_be_cancelled() {
        let err = apply(Delivered, OrderAction::Cancel).unwrap_err();
        assert_eq!(err, TransitionError { from: Delivered, to: Cancelled });
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::IllegalTransition);
        assert_eq!(app.http_status(), http::StatusCode::BAD_REQUEST);
    }
}
