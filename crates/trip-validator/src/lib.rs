//! Trip Validation
//!
//! Accepts or rejects trip candidates against duration, distance, energy,
//! acceleration and idle-time thresholds.

mod thresholds;
mod validator;

pub use thresholds::Thresholds;
pub use validator::{Rejection, TripStats, TripValidator};
