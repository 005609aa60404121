//! RiderLocationHub: live rider positions
//!
//! ```text
//! Rider WS handler
//!       │ RiderLocation
//!       ▼
//! RiderLocationHub
//!   ├── locations: rider_id → last RiderLocation (RwLock)
//!   ├── connections: rider_id → open sockets
//!   └── broadcast: Sender<RiderLocation> (fan-out to admin sockets)
//!         │
//!         ▼
//!   Admin WS handler (snapshot on attach → deltas)
//! ```
//!
//! An update mutates its entry under the write lock, downgrades and sends
//! under the read lock. A subscriber attaches under the write lock, so its
//! snapshot and its receiver never overlap or leave a gap.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use shared::models::RiderLocation;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Broadcast channel capacity; a slower admin socket gets a fresh snapshot
const BROADCAST_CAPACITY: usize = 256;

pub struct RiderLocationHub {
    locations: RwLock<HashMap<i64, RiderLocation>>,
    connections: DashMap<i64, usize>,
    tx: broadcast::Sender<RiderLocation>,
    ttl: Duration,
}

/// Dispatch-view row
#[derive(Debug, Clone, Serialize)]
pub struct RiderStatus {
    #[serde(flatten)]
    pub location: RiderLocation,
    pub live: bool,
    pub connected: bool,
}

impl RiderLocationHub {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            locations: RwLock::new(HashMap::new()),
            connections: DashMap::new(),
            tx,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a position and fan it out
    pub fn update(&self, location: RiderLocation) {
        let mut locations = self.locations.write();
        locations.insert(location.rider_id, location.clone());
        let _locations = RwLockWriteGuard::downgrade(locations);
        // no subscribers is fine
        let _ = self.tx.send(location);
    }

    /// Attach an admin subscriber: full snapshot plus a receiver for
    /// everything after it
    pub fn subscribe(&self) -> (Vec<RiderLocation>, broadcast::Receiver<RiderLocation>) {
        let locations = self.locations.write();
        let rx = self.tx.subscribe();
        (locations.values().cloned().collect(), rx)
    }

    /// Last position of a rider, if still live
    pub fn latest(&self, rider_id: i64, now: DateTime<Utc>) -> Option<RiderLocation> {
        self.locations
            .read()
            .get(&rider_id)
            .filter(|l| l.is_live(now, self.ttl))
            .cloned()
    }

    /// Every known position, stale ones included
    pub fn all(&self) -> Vec<RiderLocation> {
        self.locations.read().values().cloned().collect()
    }

    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<RiderStatus> {
        let mut out: Vec<_> = self
            .all()
            .into_iter()
            .map(|location| RiderStatus {
                live: location.is_live(now, self.ttl),
                connected: self.is_connected(location.rider_id),
                location,
            })
            .collect();
        out.sort_by_key(|s| s.location.rider_id);
        out
    }

    /// Forget positions older than `max_age`
    pub fn prune(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut locations = self.locations.write();
        let before = locations.len();
        locations.retain(|_, l| now - l.updated_at <= max_age);
        before - locations.len()
    }

    pub fn connect(&self, rider_id: i64) {
        *self.connections.entry(rider_id).or_insert(0) += 1;
    }

    pub fn disconnect(&self, rider_id: i64) {
        self.connections.remove_if_mut(&rider_id, |_, n| {
            *n = n.saturating_sub(1);
            *n == 0
        });
    }

    pub fn is_connected(&self, rider_id: i64) -> bool {
        self.connections.get(&rider_id).is_some_and(|n| *n > 0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
