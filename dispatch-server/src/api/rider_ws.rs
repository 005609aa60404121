//! Rider WebSocket: location uploads
//!
//! GET /ws/rider?token=<JWT>
//!
//! - Rider → Server: `location`, `ping`
//! - Server → Rider: `location_received`, `pong`, `error`

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use shared::dispatch::{RiderCommand, RiderReply};
use shared::error::{AppError, ErrorCode};
use shared::models::RiderLocation;
use tokio::time::Instant;

use super::ws::{self, PING_INTERVAL, READ_TIMEOUT, WsAuthQuery};
use crate::auth::Role;
use crate::db::{self, employees::Employee};
use crate::state::AppState;

/// GET /ws/rider?token=<JWT>
pub async fn handle_rider_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let identity = ws::authenticate(&state, &query.token, Role::Rider)?;
    let rider = db::employees::find_active(&state.pool, identity.id)
        .await
        .map_err(|e| {
            tracing::error!(%e, "Rider lookup failed");
            AppError::new(ErrorCode::DatabaseError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::RiderNotFound).with_detail("rider_id", identity.id))?;

    Ok(upgrade.on_upgrade(move |socket| rider_session(socket, state, rider)))
}

/// Turn one inbound command into a reply and, for a position, a location
pub fn handle_command(
    rider: &Employee,
    command: RiderCommand,
    now: DateTime<Utc>,
) -> (RiderReply, Option<RiderLocation>) {
    match command {
        RiderCommand::Ping => (RiderReply::Pong, None),
        RiderCommand::Location { lat, lng, accuracy } => {
            let valid = lat.is_finite()
                && lng.is_finite()
                && (-90.0..=90.0).contains(&lat)
                && (-180.0..=180.0).contains(&lng);
            if !valid {
                return (
                    RiderReply::Error {
                        message: format!("Coordinates out of range: {lat}, {lng}"),
                    },
                    None,
                );
            }
            let location = RiderLocation {
                rider_id: rider.id,
                employee_code: rider.employee_code.clone(),
                name: rider.name.clone(),
                phone: rider.phone.clone(),
                lat,
                lng,
                accuracy,
                updated_at: now,
            };
            (RiderReply::LocationReceived { success: true }, Some(location))
        }
    }
}

async fn rider_session(socket: WebSocket, state: AppState, rider: Employee) {
    let (mut sink, mut stream) = socket.split();
    let rider_id = rider.id;
    state.riders.connect(rider_id);
    tracing::info!(rider_id, employee_code = %rider.employee_code, "Rider WS connected");

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
                tracing::info!(rider_id, "Rider WS idle, closing");
                break;
            }

            msg = stream.next() => {
                idle.as_mut().reset(Instant::now() + READ_TIMEOUT);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<RiderCommand>(&text) {
                            Ok(command) => {
                                let (reply, location) = handle_command(&rider, command, Utc::now());
                                if let Some(location) = location {
                                    record(&state, location);
                                }
                                reply
                            }
                            Err(e) => RiderReply::Error {
                                message: format!("Invalid message: {e}"),
                            },
                        };
                        if ws::send_json(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(rider_id, %e, "Rider WS read error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.riders.disconnect(rider_id);
    tracing::info!(rider_id, "Rider WS disconnected");
}

/// Publish to admins now, persist to history in the background
fn record(state: &AppState, location: RiderLocation) {
    state.riders.update(location.clone());
    let pool = state.pool.clone();
    tokio::spawn(async move {
        if let Err(e) = db::locations::append(&pool, &location).await {
            tracing::warn!(rider_id = location.rider_id, %e, "Failed to append location history");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rider() -> Employee {
        Employee {
            id: 7,
            employee_code: "R007".into(),
            name: "Lee".into(),
            phone: Some("13800000000".into()),
        }
    }

    #[test]
    fn location_is_acknowledged_and_stamped() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let command = RiderCommand::Location {
            lat: 31.23,
            lng: 121.47,
            accuracy: Some(5.0),
        };
        let (reply, location) = handle_command(&rider(), command, now);
        assert_eq!(reply, RiderReply::LocationReceived { success: true });
        let location = location.unwrap();
        assert_eq!(location.rider_id, 7);
        assert_eq!(location.employee_code, "R007");
        assert_eq!(location.updated_at, now);
    }

    #[test]
    fn ping_and_bad_coordinates() {
        let now = Utc::now();
        assert_eq!(
            handle_command(&rider(), RiderCommand::Ping, now),
            (RiderReply::Pong, None)
        );
        let (reply, location) = handle_command(
            &rider(),
            RiderCommand::Location {
                lat: 95.0,
                lng: 10.0,
                accuracy: None,
            },
            now,
        );
        assert!(matches!(reply, RiderReply::Error { .. }));
        assert!(location.is_none());
    }
}
