//! Instantaneous Power Model

use crate::params::VehicleParams;
use crate::{
    DynamicsError, INERTIA_FACTOR, MIN_DECEL_MAGNITUDE, REGEN_DECAY_COEFF,
    STOPPED_SPEED_THRESHOLD, TARGET_CABIN_TEMP_C,
};
use telemetry::Sample;
use tracing::debug;

/// The five additive terms of the modeled power (W)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerTerms {
    /// Linear road-load term (`ca`)
    pub aerodynamic: f64,
    /// Quadratic road-load term (`cb`)
    pub rolling: f64,
    /// Cubic road-load term (`cc`)
    pub higher_order: f64,
    /// Acceleration / deceleration term
    pub inertial: f64,
    /// Auxiliary, idle and HVAC draw
    pub auxiliary: f64,
}

impl PowerTerms {
    pub fn total(&self) -> f64 {
        self.aerodynamic + self.rolling + self.higher_order + self.inertial + self.auxiliary
    }
}

/// Dynamics model bound to one validated parameter set
#[derive(Debug, Clone)]
pub struct DynamicsModel {
    params: VehicleParams,
}

impl DynamicsModel {
    /// Create a model, rejecting parameters that would make a division undefined
    pub fn new(params: VehicleParams) -> Result<Self, DynamicsError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Power terms for one kinematic state
    ///
    /// `ext_temp` of `None` contributes no HVAC load.
    pub fn terms(&self, speed: f64, acceleration: f64, ext_temp: Option<f64>) -> PowerTerms {
        let p = &self.params;
        let v = speed;
        let a = acceleration;

        let aerodynamic = p.ca * v / p.eff;
        let rolling = p.cb * v * v / p.eff;
        let higher_order = p.cc * v * v * v / p.eff;

        let motive = (1.0 + INERTIA_FACTOR) * (p.mass + p.load) * a * v;
        let inertial = if a >= 0.0 {
            motive / p.eff
        } else if p.regen_braking {
            let decay = (REGEN_DECAY_COEFF / a.abs().max(MIN_DECEL_MAGNITUDE)).exp();
            (motive / decay) * p.eff
        } else {
            0.0
        };

        let hvac = ext_temp
            .map(|t| (TARGET_CABIN_TEMP_C - t).abs() * p.hvac_power * p.hvac_eff)
            .unwrap_or(0.0);
        let idle = if v <= STOPPED_SPEED_THRESHOLD {
            p.idle_power
        } else {
            0.0
        };
        let auxiliary = p.aux_power + idle + hvac;

        PowerTerms {
            aerodynamic,
            rolling,
            higher_order,
            inertial,
            auxiliary,
        }
    }

    /// Modeled power of one sample (W)
    pub fn power(&self, sample: &Sample) -> f64 {
        self.terms(sample.speed, sample.acceleration, sample.ext_temp)
            .total()
    }

    /// Write the modeled power into every sample of a device sequence
    pub fn annotate(&self, samples: &mut [Sample]) {
        for sample in samples.iter_mut() {
            sample.modeled_power = Some(self.power(sample));
        }
        debug!("Annotated {} samples with modeled power", samples.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn model() -> DynamicsModel {
        DynamicsModel::new(VehicleParams::ioniq5()).unwrap()
    }

    fn flat_params() -> VehicleParams {
        VehicleParams {
            mass: 1900.0,
            load: 100.0,
            eff: 0.8,
            regen_braking: true,
            ca: 100.0,
            cb: 2.0,
            cc: 0.5,
            aux_power: 250.0,
            hvac_power: 350.0,
            hvac_eff: 0.81,
            idle_power: 40.0,
        }
    }

    #[test]
    fn test_road_load_terms() {
        let model = DynamicsModel::new(flat_params()).unwrap();
        let terms = model.terms(10.0, 0.0, Some(22.0));

        assert!((terms.aerodynamic - 100.0 * 10.0 / 0.8).abs() < 1e-9);
        assert!((terms.rolling - 2.0 * 100.0 / 0.8).abs() < 1e-9);
        assert!((terms.higher_order - 0.5 * 1000.0 / 0.8).abs() < 1e-9);
        assert_eq!(terms.inertial, 0.0);
        assert_eq!(terms.auxiliary, 250.0);
    }

    #[test]
    fn test_inertial_drive_and_regen() {
        let model = DynamicsModel::new(flat_params()).unwrap();
        let k = 1.05 * 2000.0;

        let drive = model.terms(10.0, 1.0, None).inertial;
        assert!((drive - k * 10.0 / 0.8).abs() < 1e-6);

        let regen = model.terms(10.0, -2.0, None).inertial;
        let expected = (k * -2.0 * 10.0 / (0.0411f64 / 2.0).exp()) * 0.8;
        assert!((regen - expected).abs() < 1e-6);
        assert!(regen < 0.0);
    }

    #[test]
    fn test_no_regen_zeroes_braking_term() {
        let mut params = flat_params();
        params.regen_braking = false;
        let model = DynamicsModel::new(params).unwrap();

        assert_eq!(model.terms(15.0, -3.0, None).inertial, 0.0);
        assert!(model.terms(15.0, 3.0, None).inertial > 0.0);
    }

    #[test]
    fn test_idle_and_hvac_draw() {
        let model = DynamicsModel::new(flat_params()).unwrap();

        let stopped = model.terms(0.5, 0.0, Some(12.0)).auxiliary;
        assert!((stopped - (250.0 + 40.0 + 10.0 * 350.0 * 0.81)).abs() < 1e-9);

        let moving = model.terms(0.6, 0.0, Some(32.0)).auxiliary;
        assert!((moving - (250.0 + 10.0 * 350.0 * 0.81)).abs() < 1e-9);
    }

    #[test]
    fn test_annotate_fills_every_sample() {
        let ts = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut samples = vec![Sample::new(ts); 4];
        samples[1].speed = 12.0;
        samples[2].acceleration = -1.5;

        model().annotate(&mut samples);
        assert!(samples.iter().all(|s| s.modeled_power.is_some()));
        assert_eq!(samples[0].modeled_power, Some(250.0));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut params = flat_params();
        params.eff = 0.0;
        assert!(DynamicsModel::new(params).is_err());
    }

    #[test]
    fn test_continuous_at_zero_acceleration() {
        let model = model();
        let at_zero = model.terms(20.0, 0.0, Some(15.0)).total();
        let below = model.terms(20.0, -1e-9, Some(15.0)).total();
        let above = model.terms(20.0, 1e-9, Some(15.0)).total();

        assert!((at_zero - below).abs() < 1e-3);
        assert!((at_zero - above).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_power_is_finite(
            speed in 0.0f64..70.0,
            accel in -15.0f64..15.0,
            temp in -40.0f64..50.0,
        ) {
            let model = model();
            prop_assert!(model.terms(speed, accel, Some(temp)).total().is_finite());
            prop_assert!(model.terms(speed, 0.0, None).total().is_finite());
            prop_assert!(model.terms(speed, -0.0, Some(temp)).total().is_finite());
        }
    }
}
