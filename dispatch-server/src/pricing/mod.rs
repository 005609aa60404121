//! Delivery fee pricing
//!
//! Parameters come from the settings cache; the calculator is pure.

mod calculator;
mod params;

pub use calculator::*;
pub use params::*;

#[cfg(test)]
mod tests;
