//! Admin WebSocket: live rider positions
//!
//! GET /ws/admin?token=<JWT>
//!
//! Server → Admin: `initial_locations` on attach (and again after a lag),
//! then one `location_update` per accepted upload.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use shared::dispatch::AdminMessage;
use shared::error::AppError;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::ws::{self, PING_INTERVAL, READ_TIMEOUT, WsAuthQuery};
use crate::auth::Role;
use crate::state::AppState;

/// GET /ws/admin?token=<JWT>
pub async fn handle_admin_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let identity = ws::authenticate(&state, &query.token, Role::Admin)?;
    Ok(upgrade.on_upgrade(move |socket| admin_session(socket, state, identity.operator())))
}

async fn admin_session(socket: WebSocket, state: AppState, operator: String) {
    let (mut sink, mut stream) = socket.split();
    let (snapshot, mut rx) = state.riders.subscribe();
    tracing::info!(
        operator = %operator,
        subscribers = state.riders.subscriber_count(),
        "Admin WS connected"
    );

    let initial = AdminMessage::InitialLocations { locations: snapshot };
    if ws::send_json(&mut sink, &initial).await.is_err() {
        return;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate
    let idle = tokio::time::sleep(READ_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if ws::send_frame(&mut sink, Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            _ = &mut idle => {
                tracing::info!(operator = %operator, "Admin WS idle, closing");
                break;
            }

            update = rx.recv() => {
                match update {
                    Ok(location) => {
                        let msg = AdminMessage::LocationUpdate { location };
                        if ws::send_json(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(operator = %operator, lagged = n, "Admin subscriber lagged, resending snapshot");
                        let (snapshot, fresh) = state.riders.subscribe();
                        rx = fresh;
                        let msg = AdminMessage::InitialLocations { locations: snapshot };
                        if ws::send_json(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                idle.as_mut().reset(Instant::now() + READ_TIMEOUT);
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!(operator = %operator, "Admin WS disconnected");
}
