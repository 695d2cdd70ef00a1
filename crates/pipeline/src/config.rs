//! Pipeline configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `EVTRIP__*`
//! environment variables (`EVTRIP__THRESHOLDS__MIN_DISTANCE_M=2000`).

use data_cleaner::ValidationConfig;
use dynamics_model::VehicleParams;
use sample_aligner::AlignConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use trip_segmenter::SegmenterConfig;
use trip_validator::Thresholds;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "EVTRIP";

/// Configuration errors; all of them abort startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no vehicle registry at {0} or its example fallback")]
    FleetMissing(PathBuf),

    #[error("failed to read vehicle registry {path}: {source}")]
    FleetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid vehicle registry {path}: {source}")]
    FleetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid parameters for vehicle model {model}: {source}")]
    Vehicle {
        model: String,
        #[source]
        source: dynamics_model::DynamicsError,
    },
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root searched recursively for BMS files
    pub raw_bms_dir: PathBuf,
    /// Root holding one positional directory per device
    pub raw_gps_dir: PathBuf,
    /// Trip files land in `<output_trip_dir>/<vehicle model>/`
    pub output_trip_dir: PathBuf,
    pub output_report_dir: PathBuf,
    /// JSON map of vehicle model to device ids
    pub fleet_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_bms_dir: PathBuf::from("data/bms"),
            raw_gps_dir: PathBuf::from("data/gps"),
            output_trip_dir: PathBuf::from("output/trips"),
            output_report_dir: PathBuf::from("output/reports"),
            fleet_file: PathBuf::from("vehicle_data.json"),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Cores left free for the rest of the system
    pub reserve: usize,
    /// Fixed worker count; overrides `reserve` when set
    pub count: Option<usize>,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            reserve: 2,
            count: None,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub thresholds: Thresholds,
    pub segmenter: SegmenterConfig,
    pub aligner: AlignConfig,
    pub validation: ValidationConfig,
    pub workers: WorkersConfig,
    /// Parameter overrides and additional models, keyed by model name
    pub vehicles: HashMap<String, VehicleParams>,
}

impl PipelineConfig {
    /// Load defaults, an optional file and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Built-in presets merged with configured overrides, keyed by lowercase
    /// model name
    ///
    /// Layered sources may fold key case, so model lookups ignore it.
    pub fn vehicle_registry(&self) -> Result<HashMap<String, VehicleParams>, ConfigError> {
        let mut registry: HashMap<String, VehicleParams> = VehicleParams::presets()
            .into_iter()
            .map(|(name, params)| (name.to_lowercase(), params))
            .collect();

        for (model, params) in &self.vehicles {
            params.validate().map_err(|source| ConfigError::Vehicle {
                model: model.clone(),
                source,
            })?;
            registry.insert(model.to_lowercase(), params.clone());
        }
        Ok(registry)
    }
}

/// Vehicle model to device ids, as listed in the fleet file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fleet {
    pub models: BTreeMap<String, Vec<String>>,
}

impl Fleet {
    /// Read the fleet file, falling back to its `.example.json` sibling
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let fallback = path.with_extension("example.json");
        let source = if path.exists() {
            path.to_path_buf()
        } else if fallback.exists() {
            warn!(
                "Vehicle registry {} not found, using {}",
                path.display(),
                fallback.display()
            );
            fallback
        } else {
            return Err(ConfigError::FleetMissing(path.to_path_buf()));
        };

        let text = fs::read_to_string(&source).map_err(|e| ConfigError::FleetRead {
            path: source.clone(),
            source: e,
        })?;
        Self::from_json(&text).map_err(|e| ConfigError::FleetParse {
            path: source,
            source: e,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Jobs for the selected models, in registry order
    ///
    /// Unknown model names are logged and skipped.
    pub fn jobs(&self, selected: &[String]) -> Vec<DeviceJob> {
        let mut jobs = Vec::new();
        for model in selected {
            let Some(devices) = self.models.get(model) else {
                warn!("Vehicle model {} is not in the registry", model);
                continue;
            };
            jobs.extend(devices.iter().map(|device| DeviceJob::new(model, device)));
        }
        jobs
    }

    /// Jobs for every model in the registry
    pub fn all_jobs(&self) -> Vec<DeviceJob> {
        let models: Vec<String> = self.models.keys().cloned().collect();
        self.jobs(&models)
    }
}

/// One unit of work: a device of a vehicle model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceJob {
    pub vehicle_model: String,
    pub device_id: String,
}

impl DeviceJob {
    pub fn new(vehicle_model: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            vehicle_model: vehicle_model.into(),
            device_id: device_id.into(),
        }
    }
}

impl std::fmt::Display for DeviceJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.vehicle_model, self.device_id)
    }
}
