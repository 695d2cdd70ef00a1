//! Trip Validator Implementation

use crate::thresholds::Thresholds;
use serde::Serialize;
use telemetry::{seconds_between, Sample, IDLE_SPEED_THRESHOLD};
use thiserror::Error;
use tracing::debug;

/// Watt-seconds per kWh
const WS_PER_KWH: f64 = 3_600_000.0;

/// Why a candidate was not accepted as a trip
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("candidate has no samples")]
    Empty,

    #[error("charging cable connected during the trip")]
    Charging,

    #[error("duration {duration_secs:.0}s below minimum")]
    TooShort { duration_secs: f64 },

    #[error("distance {distance_m:.0}m below minimum")]
    TooShortDistance { distance_m: f64 },

    #[error("energy {energy_kwh:.3}kWh below minimum")]
    TooLittleEnergy { energy_kwh: f64 },

    #[error("acceleration {acceleration:.2}m/s² exceeds limit")]
    ExcessiveAcceleration { acceleration: f64 },

    #[error("continuous idle of {idle_secs:.0}s reaches limit")]
    ProlongedIdle { idle_secs: f64 },
}

impl Rejection {
    /// Stable label for counting rejections
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Empty => "empty",
            Rejection::Charging => "charging",
            Rejection::TooShort { .. } => "duration",
            Rejection::TooShortDistance { .. } => "distance",
            Rejection::TooLittleEnergy { .. } => "energy",
            Rejection::ExcessiveAcceleration { .. } => "acceleration",
            Rejection::ProlongedIdle { .. } => "idle",
        }
    }
}

/// Statistics of an accepted trip
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TripStats {
    pub duration_secs: f64,
    pub distance_m: f64,
    /// Measured energy consumed (kWh)
    pub energy_kwh: f64,
    pub max_abs_acceleration: f64,
    /// Longest continuous idle run (seconds)
    pub longest_idle_secs: f64,
}

/// Trip validator
#[derive(Debug, Clone, Default)]
pub struct TripValidator {
    thresholds: Thresholds,
}

impl TripValidator {
    /// Create a new validator with given thresholds
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Whether the candidate passes every check
    pub fn is_valid(&self, samples: &[Sample]) -> bool {
        self.check(samples).is_ok()
    }

    /// Run the checks in order, stopping at the first failure
    pub fn check(&self, samples: &[Sample]) -> Result<TripStats, Rejection> {
        let t = &self.thresholds;
        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Rejection::Empty),
        };

        if samples.iter().any(|s| s.cable.is_connected()) {
            return Err(Rejection::Charging);
        }

        let duration_secs = seconds_between(first.timestamp, last.timestamp);
        if duration_secs < t.min_duration_secs {
            return Err(Rejection::TooShort { duration_secs });
        }

        // Δt relative to the previous sample of this trip; 0 for the first
        let deltas = trip_deltas(samples);

        let distance_m: f64 = samples.iter().zip(&deltas).map(|(s, dt)| s.speed * dt).sum();
        if distance_m < t.min_distance_m {
            return Err(Rejection::TooShortDistance { distance_m });
        }

        let energy_ws: f64 = samples
            .iter()
            .zip(&deltas)
            .map(|(s, dt)| s.measured_power * dt)
            .sum();
        let energy_kwh = energy_ws / WS_PER_KWH;
        if energy_kwh < t.min_energy_kwh {
            return Err(Rejection::TooLittleEnergy { energy_kwh });
        }

        let mut max_abs_acceleration: f64 = 0.0;
        for s in samples {
            let magnitude = s.acceleration.abs();
            if magnitude > t.max_abs_acceleration {
                return Err(Rejection::ExcessiveAcceleration {
                    acceleration: s.acceleration,
                });
            }
            max_abs_acceleration = max_abs_acceleration.max(magnitude);
        }

        let mut idle_secs = 0.0;
        let mut longest_idle_secs: f64 = 0.0;
        for (s, dt) in samples.iter().zip(&deltas) {
            if s.speed < IDLE_SPEED_THRESHOLD {
                idle_secs += dt;
                if idle_secs >= t.max_idle_duration_secs {
                    return Err(Rejection::ProlongedIdle { idle_secs });
                }
                longest_idle_secs = longest_idle_secs.max(idle_secs);
            } else {
                idle_secs = 0.0;
            }
        }

        let stats = TripStats {
            duration_secs,
            distance_m,
            energy_kwh,
            max_abs_acceleration,
            longest_idle_secs,
        };
        debug!("Accepted trip candidate: {:?}", stats);
        Ok(stats)
    }
}

fn trip_deltas(samples: &[Sample]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(
            samples
                .windows(2)
                .map(|w| seconds_between(w[0].timestamp, w[1].timestamp)),
        )
        .collect()
}
