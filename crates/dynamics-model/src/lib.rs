//! Vehicle Dynamics Model
//!
//! Computes the modeled electrical power draw of an EV from speed,
//! acceleration and ambient temperature using a fixed per-model parameter set.
//!
//! Slope resistance is not modeled: altitude-derived grade is left out of the
//! power sum.

mod model;
mod params;

pub use model::{DynamicsModel, PowerTerms};
pub use params::VehicleParams;

use thiserror::Error;

/// Rotational inertia allowance added to the vehicle mass
pub const INERTIA_FACTOR: f64 = 0.05;

/// Cabin temperature the HVAC system holds (°C)
pub const TARGET_CABIN_TEMP_C: f64 = 22.0;

/// Speed at or below which the vehicle counts as stopped for idle draw (m/s)
pub const STOPPED_SPEED_THRESHOLD: f64 = 0.5;

/// Exponent numerator of the regenerative braking decay factor
pub const REGEN_DECAY_COEFF: f64 = 0.0411;

/// Floor on |acceleration| inside the decay factor
pub const MIN_DECEL_MAGNITUDE: f64 = 0.001;

/// Parameter errors
#[derive(Debug, Clone, Error)]
pub enum DynamicsError {
    #[error("drivetrain efficiency {0} is outside (0, 1]")]
    InvalidEfficiency(f64),

    #[error("parameter {0} is not a finite number")]
    NonFinite(&'static str),
}
