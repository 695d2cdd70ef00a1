//! Sample Preparation
//!
//! Turns the unsorted raw BMS rows of one device into a time-ordered,
//! duplicate-free sample sequence with derived speed, acceleration and
//! measured power.

use crate::error::CleanError;
use crate::validator::Validator;
use telemetry::{seconds_between, RawSample, Sample, KMH_TO_MS};
use tracing::{debug, warn};

/// Clean and enrich the raw rows of one device
///
/// Rows failing [`Validator::validate_raw`] are dropped. Duplicate timestamps
/// keep the first row in arrival order.
pub fn prepare(raw: Vec<RawSample>, validator: &Validator) -> Result<Vec<Sample>, CleanError> {
    let total = raw.len();
    let mut rows: Vec<RawSample> = raw
        .into_iter()
        .filter(|row| match validator.validate_raw(row) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping raw sample: {}", e);
                false
            }
        })
        .collect();

    if rows.len() < total {
        warn!("Dropped {} of {} raw samples", total - rows.len(), total);
    }
    if rows.is_empty() {
        return Err(CleanError::Empty);
    }

    // Stable sort keeps arrival order among equal timestamps
    rows.sort_by_key(|row| row.timestamp);
    rows.dedup_by_key(|row| row.timestamp);

    let mut samples: Vec<Sample> = Vec::with_capacity(rows.len());
    for row in rows {
        let speed = row.speed_kmh * KMH_TO_MS;
        let (time_diff, acceleration) = match samples.last() {
            Some(prev) => {
                let dt = seconds_between(prev.timestamp, row.timestamp);
                let accel = if dt > 0.0 { (speed - prev.speed) / dt } else { 0.0 };
                (Some(dt), if accel.is_finite() { accel } else { 0.0 })
            }
            None => (None, 0.0),
        };

        samples.push(Sample {
            timestamp: row.timestamp,
            time_diff,
            speed,
            acceleration,
            pack_volt: row.pack_volt,
            pack_current: row.pack_current,
            measured_power: row.pack_volt * row.pack_current,
            soc: row.soc,
            soh: row.soh,
            ext_temp: row.ext_temp,
            int_temp: row.int_temp,
            cable: row.cable,
            altitude: row.altitude,
            lat: None,
            lng: None,
            modeled_power: None,
        });
    }

    debug!("Prepared {} samples", samples.len());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn raw(offset_secs: i64, speed_kmh: f64, current: f64) -> RawSample {
        RawSample::new(base() + Duration::seconds(offset_secs), speed_kmh, 400.0, current)
    }

    #[test]
    fn test_sorts_and_derives_kinematics() {
        let rows = vec![raw(2, 36.0, 10.0), raw(0, 0.0, 5.0), raw(1, 18.0, 7.5)];
        let samples = prepare(rows, &Validator::default()).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].time_diff, None);
        assert_eq!(samples[0].acceleration, 0.0);
        assert_eq!(samples[1].time_diff, Some(1.0));
        assert!((samples[1].speed - 18.0 * KMH_TO_MS).abs() < 1e-12);
        assert!((samples[1].acceleration - 18.0 * KMH_TO_MS).abs() < 1e-9);
        assert_eq!(samples[2].measured_power, 4000.0);
    }

    #[test]
    fn test_duplicate_timestamps_keep_first_arrival() {
        let rows = vec![raw(0, 0.0, 1.0), raw(5, 10.0, 2.0), raw(5, 99.0, 3.0)];
        let samples = prepare(rows, &Validator::default()).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].pack_current, 2.0);
    }

    #[test]
    fn test_drops_non_finite_rows() {
        let rows = vec![raw(0, f64::NAN, 1.0), raw(1, 10.0, 2.0)];
        let samples = prepare(rows, &Validator::default()).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            prepare(Vec::new(), &Validator::default()),
            Err(CleanError::Empty)
        ));
        assert!(matches!(
            prepare(vec![raw(0, f64::NAN, 0.0)], &Validator::default()),
            Err(CleanError::Empty)
        ));
    }

    proptest! {
        #[test]
        fn prop_output_strictly_ordered(offsets in prop::collection::vec(0i64..500, 1..200)) {
            let rows: Vec<_> = offsets.iter().map(|&o| raw(o, 20.0, 1.0)).collect();
            let samples = prepare(rows, &Validator::default()).unwrap();

            for pair in samples.windows(2) {
                prop_assert!(pair[0].timestamp < pair[1].timestamp);
            }
            prop_assert!(samples.iter().all(|s| s.acceleration.is_finite()));
        }
    }
}
