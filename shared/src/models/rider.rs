//! Rider location model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known rider position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderLocation {
    pub rider_id: i64,
    pub employee_code: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(rename = "latitude", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "longitude", alias = "lng")]
    pub lng: f64,
    pub accuracy: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl RiderLocation {
    /// Live while younger than `ttl`
    pub fn is_live(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at <= ttl
    }
}
