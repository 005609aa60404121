//! Payment provider callbacks
//!
//! Raw body, verified against the signature header before parsing. A
//! non-success response makes the provider retry; every handler is safe to
//! replay.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use shared::error::AppError;

use crate::error::{ApiResult, ok};
use crate::payment::{self, PayNotify, RefundNotify, SIGNATURE_HEADER};
use crate::services::{checkout, lifecycle};
use crate::state::AppState;

fn verified<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T, AppError> {
    let sig_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Callback without signature header");
            AppError::validation("Missing signature header")
        })?;

    payment::verify_signature(
        body,
        sig_header,
        &state.pay_callback_secret,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = e, "Callback signature verification failed");
        AppError::validation("Invalid callback signature")
    })?;

    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(%e, "Failed to parse callback JSON");
        AppError::validation(format!("Invalid callback body: {e}"))
    })
}

/// POST /pay/notify
pub async fn notify(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<()> {
    let notify: PayNotify = verified(&state, &headers, &body)?;
    tracing::info!(
        out_trade_no = %notify.out_trade_no,
        trade_state = %notify.trade_state,
        "Received payment callback"
    );
    checkout::pay_notify(&state, &notify, chrono::Utc::now()).await?;
    ok(())
}

/// POST /pay/refund-notify
pub async fn refund_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<()> {
    let notify: RefundNotify = verified(&state, &headers, &body)?;
    tracing::info!(
        out_trade_no = %notify.out_trade_no,
        refund_status = %notify.refund_status,
        "Received refund callback"
    );
    lifecycle::refund_notify(&state, &notify).await?;
    ok(())
}
