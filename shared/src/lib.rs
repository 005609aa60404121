//! Shared types for the dispatch backend
//!
//! Error types, response envelopes, data models and WebSocket protocol
//! types used by the server and its clients.

pub mod dispatch;
pub mod error;
pub mod models;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
