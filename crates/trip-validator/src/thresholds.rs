//! Validation thresholds

use serde::{Deserialize, Serialize};

/// Trip validity thresholds, inclusive on the accepting side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum trip duration (seconds)
    pub min_duration_secs: f64,
    /// Minimum distance travelled (m)
    pub min_distance_m: f64,
    /// Minimum measured energy consumed (kWh)
    pub min_energy_kwh: f64,
    /// Maximum allowed |acceleration| (m/s²)
    pub max_abs_acceleration: f64,
    /// Maximum continuous idle time (seconds)
    pub max_idle_duration_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_duration_secs: 300.0,  // 5 minutes
            min_distance_m: 3000.0,    // 3 km
            min_energy_kwh: 1.0,
            max_abs_acceleration: 9.0,
            max_idle_duration_secs: 300.0,
        }
    }
}
