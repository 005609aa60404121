//! Dispatch WebSocket protocol types
//!
//! Rider clients push positions, admin consoles receive the live map.

pub mod ws;

pub use ws::*;
