//! Shared WebSocket plumbing for the rider and admin channels

use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use std::time::Duration;

use crate::auth::{self, Identity, Role};
use crate::state::AppState;

/// Idle connections are closed after this long without any inbound frame
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);
pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Browsers cannot set headers on a WebSocket upgrade
#[derive(Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

pub fn authenticate(state: &AppState, token: &str, role: Role) -> Result<Identity, AppError> {
    let identity = auth::verify_token(token, &state.jwt_secret)?;
    auth::authorize(&identity, &[role])?;
    Ok(identity)
}

/// Serialize and send one message, bounded by the write deadline
///
/// An error means the peer is gone and the session should end.
pub async fn send_json<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &T,
) -> Result<(), ()> {
    let text = serde_json::to_string(msg).map_err(|e| {
        tracing::error!(%e, "Failed to serialize WS message");
    })?;
    send_frame(sink, Message::Text(text.into())).await
}

pub async fn send_frame(sink: &mut SplitSink<WebSocket, Message>, frame: Message) -> Result<(), ()> {
    match tokio::time::timeout(WRITE_TIMEOUT, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(%e, "WS write failed");
            Err(())
        }
        Err(_) => {
            tracing::warn!("WS write timed out");
            Err(())
        }
    }
}
