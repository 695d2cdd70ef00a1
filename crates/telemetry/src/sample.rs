//! Sample records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Charging cable state reported by the BMS (`chrg_cable_conn`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CableState {
    Connected,
    Disconnected,
    /// Column absent or value unreadable
    #[default]
    Unknown,
}

impl CableState {
    /// Map the raw 0/1 column value
    pub fn from_raw(value: Option<f64>) -> Self {
        match value {
            Some(v) if v == 1.0 => CableState::Connected,
            Some(v) if v == 0.0 => CableState::Disconnected,
            _ => CableState::Unknown,
        }
    }

    pub fn is_connected(self) -> bool {
        self == CableState::Connected
    }
}

/// One BMS row as read from the device logs, before cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: NaiveDateTime,
    /// Vehicle speed in km/h (`emobility_spd`)
    pub speed_kmh: f64,
    pub pack_volt: f64,
    pub pack_current: f64,
    pub soc: Option<f64>,
    pub soh: Option<f64>,
    pub ext_temp: Option<f64>,
    pub int_temp: Option<f64>,
    pub cable: CableState,
    /// Some BMS exports already carry an altitude column
    pub altitude: Option<f64>,
}

impl RawSample {
    /// Row with the required fields set and everything optional absent
    pub fn new(timestamp: NaiveDateTime, speed_kmh: f64, pack_volt: f64, pack_current: f64) -> Self {
        Self {
            timestamp,
            speed_kmh,
            pack_volt,
            pack_current,
            soc: None,
            soh: None,
            ext_temp: None,
            int_temp: None,
            cable: CableState::Unknown,
            altitude: None,
        }
    }
}

/// Cleaned electrical sample with derived kinematics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    /// Seconds since the previous sample of the device, `None` for the first
    pub time_diff: Option<f64>,
    /// m/s
    pub speed: f64,
    /// m/s²
    pub acceleration: f64,
    pub pack_volt: f64,
    pub pack_current: f64,
    /// Measured power (W), voltage × current
    pub measured_power: f64,
    pub soc: Option<f64>,
    pub soh: Option<f64>,
    pub ext_temp: Option<f64>,
    pub int_temp: Option<f64>,
    pub cable: CableState,
    pub altitude: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Modeled power (W) from the dynamics model, `None` until annotated
    pub modeled_power: Option<f64>,
}

impl Sample {
    /// Stationary sample at `timestamp` with every reading zeroed
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            time_diff: None,
            speed: 0.0,
            acceleration: 0.0,
            pack_volt: 0.0,
            pack_current: 0.0,
            measured_power: 0.0,
            soc: None,
            soh: None,
            ext_temp: None,
            int_temp: None,
            cable: CableState::Unknown,
            altitude: None,
            lat: None,
            lng: None,
            modeled_power: None,
        }
    }

    /// Clear altitude, latitude and longitude
    pub fn clear_position(&mut self) {
        self.altitude = None;
        self.lat = None;
        self.lng = None;
    }
}

/// GPS/altitude reading, sourced independently of the BMS stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionalSample {
    pub timestamp: NaiveDateTime,
    pub altitude: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cable_state_from_raw() {
        assert_eq!(CableState::from_raw(Some(1.0)), CableState::Connected);
        assert_eq!(CableState::from_raw(Some(0.0)), CableState::Disconnected);
        assert_eq!(CableState::from_raw(Some(2.0)), CableState::Unknown);
        assert_eq!(CableState::from_raw(None), CableState::Unknown);
        assert!(CableState::Connected.is_connected());
        assert!(!CableState::Unknown.is_connected());
    }
}
