//! Vehicle parameter sets

use crate::DynamicsError;
use serde::{Deserialize, Serialize};

/// Newtons per pound-force
const LBF_TO_N: f64 = 4.44822;
/// mph per m/s
const MS_TO_MPH: f64 = 2.237;

/// Per vehicle-model constants for the dynamics model
///
/// Units: mass and load in kg, `ca` in N, `cb` in N/(m/s), `cc` in N/(m/s)²,
/// powers in W, efficiencies in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    pub mass: f64,
    /// Additional load (driver, cargo)
    pub load: f64,
    /// Drivetrain efficiency
    pub eff: f64,
    /// Regenerative braking enabled
    pub regen_braking: bool,
    pub ca: f64,
    pub cb: f64,
    pub cc: f64,
    pub aux_power: f64,
    pub hvac_power: f64,
    pub hvac_eff: f64,
    pub idle_power: f64,
}

impl VehicleParams {
    /// Parameters shared by the built-in presets, given mass and the
    /// EPA coast-down coefficients A (lbf), B (lbf/mph), C (lbf/mph²)
    fn from_coastdown(mass: f64, a_lbf: f64, b_lbf_mph: f64, c_lbf_mph2: f64) -> Self {
        Self {
            mass,
            load: 100.0,
            eff: 0.9,
            regen_braking: true,
            ca: a_lbf * LBF_TO_N,
            cb: b_lbf_mph * LBF_TO_N * MS_TO_MPH,
            cc: c_lbf_mph2 * LBF_TO_N * MS_TO_MPH * MS_TO_MPH,
            aux_power: 250.0,
            hvac_power: 350.0,
            hvac_eff: 0.81,
            idle_power: 0.0,
        }
    }

    pub fn niro_ev() -> Self {
        Self::from_coastdown(1928.0, 32.717, -0.19110, 0.023073)
    }

    pub fn ioniq5() -> Self {
        Self::from_coastdown(2268.0, 34.342, 0.21928, 0.022718)
    }

    pub fn ioniq6() -> Self {
        Self::from_coastdown(2041.168, 23.958, 0.15007, 0.015929)
    }

    pub fn kona_ev() -> Self {
        Self::from_coastdown(1814.0, 24.859, -0.20036, 0.023656)
    }

    pub fn ev6() -> Self {
        Self::from_coastdown(2154.564, 36.158, 0.29099, 0.019825)
    }

    pub fn gv60() -> Self {
        Self::from_coastdown(2154.564, 23.290, 0.23788, 0.019822)
    }

    /// Built-in presets keyed by vehicle model name
    pub fn presets() -> Vec<(&'static str, Self)> {
        vec![
            ("NiroEV", Self::niro_ev()),
            ("Ioniq5", Self::ioniq5()),
            ("Ioniq6", Self::ioniq6()),
            ("KonaEV", Self::kona_ev()),
            ("EV6", Self::ev6()),
            ("GV60", Self::gv60()),
        ]
    }

    /// Look up a built-in preset by model name
    pub fn preset(model: &str) -> Option<Self> {
        Self::presets()
            .into_iter()
            .find(|(name, _)| *name == model)
            .map(|(_, params)| params)
    }

    /// Check that every division in the model is well defined
    pub fn validate(&self) -> Result<(), DynamicsError> {
        for (name, value) in [
            ("mass", self.mass),
            ("load", self.load),
            ("eff", self.eff),
            ("ca", self.ca),
            ("cb", self.cb),
            ("cc", self.cc),
            ("aux_power", self.aux_power),
            ("hvac_power", self.hvac_power),
            ("hvac_eff", self.hvac_eff),
            ("idle_power", self.idle_power),
        ] {
            if !value.is_finite() {
                return Err(DynamicsError::NonFinite(name));
            }
        }
        if self.eff <= 0.0 || self.eff > 1.0 {
            return Err(DynamicsError::InvalidEfficiency(self.eff));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        let presets = VehicleParams::presets();
        assert_eq!(presets.len(), 6);
        for (name, params) in presets {
            assert!(params.validate().is_ok(), "{} preset invalid", name);
        }
    }

    #[test]
    fn test_coastdown_conversion() {
        let niro = VehicleParams::niro_ev();
        assert!((niro.ca - 32.717 * 4.44822).abs() < 1e-9);
        assert!(niro.cb < 0.0);
        assert!((niro.cc - 0.023073 * 4.44822 * 2.237 * 2.237).abs() < 1e-9);
        assert_eq!(niro.mass + niro.load, 2028.0);
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(VehicleParams::preset("EV6"), Some(VehicleParams::ev6()));
        assert!(VehicleParams::preset("Model3").is_none());
    }

    #[test]
    fn test_rejects_bad_efficiency() {
        let mut params = VehicleParams::ioniq5();
        params.eff = 0.0;
        assert!(matches!(
            params.validate(),
            Err(DynamicsError::InvalidEfficiency(_))
        ));
        params.eff = 1.2;
        assert!(params.validate().is_err());
        params.eff = f64::NAN;
        assert!(matches!(params.validate(), Err(DynamicsError::NonFinite("eff"))));
    }
}
