//! Cleaning Error Types

use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors for a single value or record
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// NaN or infinite reading
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),

    /// Timestamp outside the accepted window
    #[error("timestamp {timestamp} is outside [{earliest}, {latest}]")]
    TimestampOutOfRange {
        timestamp: NaiveDateTime,
        earliest: NaiveDateTime,
        latest: NaiveDateTime,
    },
}

/// Data-quality errors that leave a device with nothing to process
#[derive(Debug, Clone, Error)]
pub enum CleanError {
    /// No rows survived cleaning
    #[error("no usable samples after cleaning")]
    Empty,

    /// No row carried a parseable timestamp
    #[error("no parseable timestamps")]
    NoValidTimestamps,

    /// Required columns missing from the input
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}
