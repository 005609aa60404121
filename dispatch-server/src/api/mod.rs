//! HTTP and WebSocket routes
//!
//! Route groups share a role gate; callbacks and sockets authenticate on
//! their own (signature, `?token=`).

pub mod admin_ws;
pub mod checkout;
pub mod commissions;
pub mod delivery;
pub mod health;
pub mod orders;
pub mod pay;
pub mod rider_ws;
pub mod riders;
pub mod settings;
pub mod supplier_payments;
pub mod verifications;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::error::AppError;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{Role, require_roles};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_IN_FLIGHT: usize = 512;

const CUSTOMER: &[Role] = &[Role::Customer];
const RIDER: &[Role] = &[Role::Rider];
const SALES: &[Role] = &[Role::Sales];
const ADMIN: &[Role] = &[Role::Admin];
const CANCELLERS: &[Role] = &[Role::Customer, Role::Admin];
const PICKERS: &[Role] = &[Role::Rider, Role::Admin];

/// `?page=&per_page=` with 1-based pages
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// `(limit, offset)`; at most 100 rows per page
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1) * per_page)
    }
}

/// JSON body that may be omitted entirely
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))
}

fn gate(state: &AppState, roles: &'static [Role], router: Router<AppState>) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(
        (state.clone(), roles),
        require_roles,
    ))
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let customer = Router::new()
        .route("/cart/orders", post(checkout::create_order))
        .route("/prepay", post(checkout::prepay));

    let rider = Router::new()
        .route("/orders/{id}/accept", post(orders::accept))
        .route("/orders/{id}/complete", post(orders::complete))
        .route("/delivery/income", get(delivery::income))
        .route("/delivery/income/details", get(delivery::income_details));

    let cancel = Router::new().route("/orders/{id}/cancel", post(orders::cancel));

    let pick = Router::new().route("/orders/{id}/items/{item_id}/pick", post(orders::pick_item));

    let sales = Router::new().route(
        "/orders/{id}/payment-verifications",
        post(verifications::file),
    );

    let admin = Router::new()
        .route(
            "/admin/supplier-payments",
            post(supplier_payments::create).get(supplier_payments::list),
        )
        .route("/admin/supplier-payments/stats", get(supplier_payments::stats))
        .route(
            "/admin/supplier-payments/{id}/detail",
            get(supplier_payments::detail),
        )
        .route(
            "/admin/supplier-payments/{id}/cancel",
            post(supplier_payments::cancel),
        )
        .route("/admin/delivery/settle", post(delivery::settle))
        .route("/admin/commissions", get(commissions::list))
        .route("/admin/commissions/stats", get(commissions::stats))
        .route("/admin/commissions/account", post(commissions::account))
        .route("/admin/commissions/settle", post(commissions::settle))
        .route(
            "/admin/commissions/cancel-account",
            post(commissions::cancel_account),
        )
        .route("/admin/commissions/recalculate", post(commissions::recalculate))
        .route(
            "/admin/commission-config",
            get(commissions::get_config).post(commissions::update_config),
        )
        .route(
            "/admin/payment-verifications/{id}/approve",
            post(verifications::approve),
        )
        .route(
            "/admin/payment-verifications/{id}/reject",
            post(verifications::reject),
        )
        .route(
            "/admin/settings/delivery-fee",
            get(settings::get_fee_settings).put(settings::update_fee_settings),
        )
        .route("/admin/riders/locations", get(riders::locations))
        .route("/admin/riders/{rider_id}/location", get(riders::location));

    // Signature-verified callbacks, raw body
    let callbacks = Router::new()
        .route("/pay/notify", post(pay::notify))
        .route("/pay/refund-notify", post(pay::refund_notify));

    // JWT in the query string
    let sockets = Router::new()
        .route("/ws/rider", get(rider_ws::handle_rider_ws))
        .route("/ws/admin", get(admin_ws::handle_admin_ws));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(gate(&state, CUSTOMER, customer))
        .merge(gate(&state, RIDER, rider))
        .merge(gate(&state, CANCELLERS, cancel))
        .merge(gate(&state, PICKERS, pick))
        .merge(gate(&state, SALES, sales))
        .merge(gate(&state, ADMIN, admin))
        .merge(callbacks)
        .merge(sockets)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps() {
        assert_eq!(Pagination::default().limit_offset(), (20, 0));
        let p = Pagination {
            page: Some(3),
            per_page: Some(500),
        };
        assert_eq!(p.limit_offset(), (100, 200));
        let p = Pagination {
            page: Some(0),
            per_page: Some(0),
        };
        assert_eq!(p.limit_offset(), (1, 0));
    }

    #[test]
    fn omitted_body_takes_defaults() {
        let req: orders::CancelRequest = optional_body(b"").unwrap();
        assert!(req.reason.is_none());
        let req: orders::CancelRequest = optional_body(br#"{"reason":"duplicate"}"#).unwrap();
        assert_eq!(req.reason.as_deref(), Some("duplicate"));
        assert!(optional_body::<orders::CancelRequest>(b"{").is_err());
    }
}
