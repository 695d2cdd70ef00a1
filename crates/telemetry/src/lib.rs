//! EV Telemetry Types
//!
//! Sample types shared by every stage of the trip pipeline: raw BMS rows as
//! read from the device logs, cleaned samples with derived kinematics, and
//! the sparser positional (GPS/altitude) stream.

mod sample;
mod time;

pub use sample::{CableState, PositionalSample, RawSample, Sample};
pub use time::{seconds_between, year_month};

/// Conversion factor from km/h (as reported by the BMS) to m/s
pub const KMH_TO_MS: f64 = 0.27778;

/// Speed below which a sample counts as idle for trip validation (m/s)
pub const IDLE_SPEED_THRESHOLD: f64 = 0.1;

/// Maximum reporting gap inside one trip (seconds)
pub const MAX_SAMPLE_GAP_SECS: f64 = 600.0;
