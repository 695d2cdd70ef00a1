//! Record Range Checking

use crate::error::ValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use telemetry::{PositionalSample, RawSample};
use tracing::{debug, warn};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Latitude valid range (degrees)
    pub latitude_range: (f64, f64),
    /// Longitude valid range (degrees)
    pub longitude_range: (f64, f64),
    /// Altitude valid range (m)
    pub altitude_range: (f64, f64),
    /// Earliest accepted timestamp
    pub earliest: NaiveDateTime,
    /// Latest accepted timestamp
    pub latest: NaiveDateTime,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            latitude_range: (-90.0, 90.0),
            longitude_range: (-180.0, 180.0),
            altitude_range: (-500.0, 9000.0),
            earliest: midnight(2000, 1, 1),
            latest: midnight(2100, 1, 1),
        }
    }
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Range checker for BMS and positional records
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite(field));
        }
        if value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a timestamp against the accepted window
    pub fn validate_timestamp(&self, timestamp: NaiveDateTime) -> Result<(), ValidationError> {
        if timestamp < self.config.earliest || timestamp > self.config.latest {
            Err(ValidationError::TimestampOutOfRange {
                timestamp,
                earliest: self.config.earliest,
                latest: self.config.latest,
            })
        } else {
            Ok(())
        }
    }

    /// Required BMS readings must be finite
    pub fn validate_raw(&self, raw: &RawSample) -> Result<(), ValidationError> {
        self.validate_timestamp(raw.timestamp)?;
        for (field, value) in [
            ("emobility_spd", raw.speed_kmh),
            ("pack_volt", raw.pack_volt),
            ("pack_current", raw.pack_current),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite(field));
            }
        }
        Ok(())
    }

    /// Positional records need an in-window timestamp and in-range coordinates
    pub fn validate_positional(&self, sample: &PositionalSample) -> Result<(), ValidationError> {
        self.validate_timestamp(sample.timestamp)?;
        if let Some(lat) = sample.lat {
            self.validate_range("lat", lat, self.config.latitude_range)?;
        }
        if let Some(lng) = sample.lng {
            self.validate_range("lng", lng, self.config.longitude_range)?;
        }
        Ok(())
    }

    /// Drop invalid positional records; implausible altitudes are blanked, not dropped
    pub fn retain_positional(&self, samples: Vec<PositionalSample>) -> Vec<PositionalSample> {
        let total = samples.len();
        let kept: Vec<_> = samples
            .into_iter()
            .filter_map(|mut sample| {
                if let Err(e) = self.validate_positional(&sample) {
                    debug!("Dropping positional sample: {}", e);
                    return None;
                }
                if let Some(alt) = sample.altitude {
                    if self
                        .validate_range("altitude", alt, self.config.altitude_range)
                        .is_err()
                    {
                        sample.altitude = None;
                    }
                }
                Some(sample)
            })
            .collect();

        if kept.len() < total {
            warn!(
                "Dropped {} of {} positional samples during validation",
                total - kept.len(),
                total
            );
        }
        kept
    }
}
