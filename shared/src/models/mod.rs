//! Data models shared between the dispatch server and its clients

pub mod commission;
pub mod coupon;
pub mod fee;
pub mod order;
pub mod rider;
pub mod supplier;

pub use commission::*;
pub use coupon::*;
pub use fee::*;
pub use order::*;
pub use rider::*;
pub use supplier::*;
