//! Order Lifecycle Manager
//!
//! Pure pieces of the order lifecycle. Transactions live in `services`.

pub mod checkout;
pub mod number;
pub mod prepay;
pub mod settlement;
pub mod status;

pub use checkout::{
    Catalog, CatalogSku, CheckoutInput, DraftItem, OrderDraft, PurchaseListLine, build_draft,
    compose_total,
};
pub use prepay::{PrepayCache, PrepayEntry, PrepayError};
pub use settlement::{CancelPlan, CompletePlan, PaidDecision};
pub use status::{OrderAction, TransitionError};
