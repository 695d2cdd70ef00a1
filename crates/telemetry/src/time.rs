//! Timestamp helpers

use chrono::NaiveDateTime;

/// Signed difference `later - earlier` in fractional seconds
pub fn seconds_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// `YYYY-MM` label used to group trips by month
pub fn year_month(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m").to_string()
}
