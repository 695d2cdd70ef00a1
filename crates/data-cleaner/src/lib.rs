//! Raw Telemetry Cleaning
//!
//! Timestamp parsing, range checking, and derivation of per-sample
//! kinematics for the BMS and positional streams of one device.

mod error;
mod preprocess;
mod timestamp;
mod validator;

pub use error::{CleanError, ValidationError};
pub use preprocess::prepare;
pub use timestamp::{parse_positional_timestamp, TimestampParser, BMS_TIME_FORMATS};
pub use validator::{ValidationConfig, Validator};
