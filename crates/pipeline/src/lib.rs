//! EV Trip Pipeline
//!
//! Turns raw BMS and positional exports of a vehicle fleet into validated,
//! tagged trips:
//! - Per-device cleaning and time alignment
//! - Modeled power from the vehicle dynamics model
//! - Trip segmentation and validation
//! - Parallel execution across devices

pub mod config;
pub mod device;
pub mod outcome;
pub mod runner;
pub mod source;

pub use config::{ConfigError, DeviceJob, Fleet, PipelineConfig};
pub use device::{process_device, DeviceTrips, TripPipeline};
pub use outcome::{DeviceOutcome, DeviceStatus, RunSummary};
pub use runner::{worker_count, FleetRunner};
pub use source::{CsvDirectorySource, DeviceData, DeviceSource, MemorySource, SourceError};

use thiserror::Error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] trip_storage::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the verbosity flag.
pub fn init_logging(verbose: bool, json: bool) -> Result<(), PipelineError> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}
