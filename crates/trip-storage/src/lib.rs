//! Trip Storage Layer
//!
//! Names and persists accepted trips, and summarizes the persisted trip tree.

mod record;
mod report;
mod repository;
mod writer;

pub use record::{MonthlySequencer, TripRecord, ALTITUDE_PREFIX, PLAIN_PREFIX};
pub use report::{DeviceRow, ModelSummary, TripFileName, TripReport};
pub use repository::{Repository, StoredTrip};
pub use writer::{CsvTripWriter, TripSink};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Lock error: {0}")]
    Lock(String),
}
