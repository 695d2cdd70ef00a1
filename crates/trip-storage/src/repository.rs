//! In-memory trip repository

use crate::record::TripRecord;
use crate::writer::TripSink;
use crate::StorageError;
use serde::Serialize;
use std::sync::Mutex;
use tracing::debug;

/// What the repository keeps of a persisted trip; samples are not retained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTrip {
    pub vehicle_model: String,
    pub device_id: String,
    pub file_name: String,
    pub sample_count: usize,
}

impl From<&TripRecord> for StoredTrip {
    fn from(record: &TripRecord) -> Self {
        Self {
            vehicle_model: record.vehicle_model.clone(),
            device_id: record.device_id.clone(),
            file_name: record.file_name(),
            sample_count: record.samples.len(),
        }
    }
}

/// Records the trips a run would write (dry runs and tests)
pub struct Repository {
    trips: Mutex<Vec<StoredTrip>>,
}

impl Repository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            trips: Mutex::new(Vec::new()),
        }
    }

    /// Trips of one device, in insertion order
    pub fn trips_for(&self, device_id: &str) -> Result<Vec<StoredTrip>, StorageError> {
        let trips = self
            .trips
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        Ok(trips
            .iter()
            .filter(|t| t.device_id == device_id)
            .cloned()
            .collect())
    }

    /// `(vehicle model, file name)` of every stored trip
    pub fn file_names(&self) -> Vec<(String, String)> {
        self.trips
            .lock()
            .map(|trips| {
                trips
                    .iter()
                    .map(|t| (t.vehicle_model.clone(), t.file_name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get total trip count
    pub fn trip_count(&self) -> usize {
        self.trips.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl TripSink for Repository {
    fn persist(&self, record: &TripRecord) -> Result<(), StorageError> {
        let mut trips = self
            .trips
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        debug!("Stored trip {}", record.file_stem());
        trips.push(StoredTrip::from(record));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use telemetry::Sample;

    fn record(device: &str, seq: u32) -> TripRecord {
        let ts = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        TripRecord::new("GV60", device, seq, vec![Sample::new(ts); 3]).unwrap()
    }

    #[test]
    fn test_persist_and_query() {
        let repo = Repository::new();
        repo.persist(&record("d1", 1)).unwrap();
        repo.persist(&record("d2", 1)).unwrap();
        repo.persist(&record("d1", 2)).unwrap();

        assert_eq!(repo.trip_count(), 3);
        let d1 = repo.trips_for("d1").unwrap();
        assert_eq!(d1.len(), 2);
        assert_eq!(d1[1].file_name, "Trip_d1_2023-12_trip_2.csv");
        assert_eq!(d1[1].sample_count, 3);
        assert_eq!(
            repo.file_names()[0],
            ("GV60".to_string(), "Trip_d1_2023-12_trip_1.csv".to_string())
        );
    }
}
