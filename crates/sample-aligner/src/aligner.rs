//! Nearest-Timestamp Join

use crate::interpolation::fill_linear;
use chrono::{Duration, NaiveDateTime};
use data_cleaner::Validator;
use serde::{Deserialize, Serialize};
use telemetry::{PositionalSample, Sample};
use tracing::{debug, info};

/// Aligner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Maximum |Δt| between a BMS sample and its positional match (seconds)
    pub tolerance_secs: i64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self { tolerance_secs: 2 }
    }
}

/// Upper bound on the match tolerance: one day
const MAX_TOLERANCE_SECS: i64 = 86_400;

impl AlignConfig {
    /// Tolerance clamped to `0..=MAX_TOLERANCE_SECS`
    pub fn tolerance(&self) -> Duration {
        Duration::seconds(self.tolerance_secs.clamp(0, MAX_TOLERANCE_SECS))
    }
}

/// Merges the positional stream of one device into its BMS samples
#[derive(Debug, Clone, Default)]
pub struct SampleAligner {
    config: AlignConfig,
    validator: Validator,
}

impl SampleAligner {
    /// Create a new aligner
    pub fn new(config: AlignConfig, validator: Validator) -> Self {
        Self { config, validator }
    }

    /// Validate the positional stream, then align it to `primary`
    pub fn align(&self, primary: &[Sample], secondary: Vec<PositionalSample>) -> Vec<Sample> {
        let secondary = self.validator.retain_positional(secondary);
        align(primary, &secondary, self.config.tolerance())
    }
}

/// Attach the nearest positional sample within `tolerance` to each primary sample
///
/// With an empty `secondary` every positional field of the output is absent.
/// Otherwise matched rows take latitude and longitude from their match, and
/// altitude from the match falling back to the primary row's own altitude.
/// Altitude is then gap-filled over the row index; latitude and longitude are
/// not. Ties between an earlier and a later candidate go to the earlier one.
pub fn align(primary: &[Sample], secondary: &[PositionalSample], tolerance: Duration) -> Vec<Sample> {
    if secondary.is_empty() {
        debug!("No positional stream; positional fields left absent");
        return primary
            .iter()
            .cloned()
            .map(|mut sample| {
                sample.clear_position();
                sample
            })
            .collect();
    }

    let mut sorted: Vec<&PositionalSample> = secondary.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let mut matched = 0usize;
    let mut merged: Vec<Sample> = primary
        .iter()
        .map(|sample| {
            let mut out = sample.clone();
            match nearest(&sorted, sample.timestamp, tolerance) {
                Some(pos) => {
                    matched += 1;
                    out.altitude = pos.altitude.or(sample.altitude);
                    out.lat = pos.lat;
                    out.lng = pos.lng;
                }
                None => {
                    out.lat = None;
                    out.lng = None;
                }
            }
            out
        })
        .collect();

    let mut altitude: Vec<Option<f64>> = merged.iter().map(|s| s.altitude).collect();
    fill_linear(&mut altitude);
    for (sample, alt) in merged.iter_mut().zip(altitude) {
        sample.altitude = alt;
    }

    info!(
        "Aligned {} of {} samples to {} positional records",
        matched,
        merged.len(),
        sorted.len()
    );
    merged
}

fn nearest<'a>(
    sorted: &[&'a PositionalSample],
    at: NaiveDateTime,
    tolerance: Duration,
) -> Option<&'a PositionalSample> {
    // Last record at or before `at`, first record at or after `at`
    let backward = sorted
        .partition_point(|p| p.timestamp <= at)
        .checked_sub(1)
        .map(|i| sorted[i]);
    let forward = sorted.get(sorted.partition_point(|p| p.timestamp < at)).copied();

    let best = match (backward, forward) {
        (Some(b), Some(f)) => {
            if f.timestamp - at < at - b.timestamp {
                f
            } else {
                b
            }
        }
        (Some(b), None) => b,
        (None, Some(f)) => f,
        (None, None) => return None,
    };

    let distance = (best.timestamp - at).abs();
    (distance <= tolerance).then_some(best)
}
