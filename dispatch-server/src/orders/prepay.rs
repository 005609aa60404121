//! Prepay holding area
//!
//! Online orders are fully priced before payment but only persisted when
//! the payment callback arrives. Until then the draft lives here, keyed by
//! out_trade_no, for a limited time.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use shared::error::{AppError, ErrorCode};
use std::collections::HashMap;
use thiserror::Error;

use super::checkout::OrderDraft;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepayError {
    #[error("prepay {0} not found")]
    NotFound(String),
    #[error("prepay {0} has expired")]
    Expired(String),
}

impl From<PrepayError> for AppError {
    fn from(e: PrepayError) -> Self {
        let message = e.to_string();
        match e {
            PrepayError::NotFound(no) => AppError::with_message(ErrorCode::PrepayNotFound, message)
                .with_detail("out_trade_no", no),
            PrepayError::Expired(no) => AppError::with_message(ErrorCode::PrepayExpired, message)
                .with_detail("out_trade_no", no),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrepayEntry {
    pub out_trade_no: String,
    pub draft: OrderDraft,
    pub created_at: DateTime<Utc>,
}

/// Process-wide prepay cache
///
/// Writers and the sweeper take the exclusive lock; lookups share it.
#[derive(Debug)]
pub struct PrepayCache {
    entries: RwLock<HashMap<String, PrepayEntry>>,
    ttl: Duration,
}

impl PrepayCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a draft; an existing entry under the same key is replaced
    pub fn insert(&self, entry: PrepayEntry) {
        self.entries
            .write()
            .insert(entry.out_trade_no.clone(), entry);
    }

    /// Fetch a live entry without removing it
    pub fn get(&self, out_trade_no: &str, now: DateTime<Utc>) -> Result<PrepayEntry, PrepayError> {
        let entries = self.entries.read();
        let entry = entries
            .get(out_trade_no)
            .ok_or_else(|| PrepayError::NotFound(out_trade_no.to_string()))?;
        if now - entry.created_at > self.ttl {
            return Err(PrepayError::Expired(out_trade_no.to_string()));
        }
        Ok(entry.clone())
    }

    /// Drop an entry once its order is committed
    pub fn remove(&self, out_trade_no: &str) -> Option<PrepayEntry> {
        self.entries.write().remove(out_trade_no)
    }

    /// Remove expired entries, returning how many were dropped
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| now - e.created_at <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
