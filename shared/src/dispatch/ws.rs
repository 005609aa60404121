//! Dispatch WebSocket protocol
//!
//! Rider → Server: RiderCommand
//! Server → Rider: RiderReply
//! Server → Admin: AdminMessage

use serde::{Deserialize, Serialize};

use crate::models::RiderLocation;

/// Rider → Server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiderCommand {
    /// Position report
    Location {
        #[serde(alias = "latitude")]
        lat: f64,
        #[serde(alias = "longitude")]
        lng: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
    },
    /// Application-level heartbeat
    Ping,
}

/// Server → Rider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiderReply {
    LocationReceived { success: bool },
    Pong,
    Error { message: String },
}

/// Server → Admin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminMessage {
    /// Sent on connect and after a lag: every known rider, stale ones included
    InitialLocations { locations: Vec<RiderLocation> },
    /// One rider moved
    LocationUpdate { location: RiderLocation },
}
