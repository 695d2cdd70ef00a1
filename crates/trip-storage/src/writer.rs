//! Trip persistence

use crate::record::TripRecord;
use crate::StorageError;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Destination for accepted trips
pub trait TripSink: Send + Sync {
    /// Persist one trip
    fn persist(&self, record: &TripRecord) -> Result<(), StorageError>;
}

/// Writes each trip to `<root>/<vehicle model>/<file name>`
#[derive(Debug, Clone)]
pub struct CsvTripWriter {
    root: PathBuf,
}

impl CsvTripWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the per-model output directory
    pub fn prepare_model_dir(&self, vehicle_model: &str) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(vehicle_model);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    /// Full path a record is written to
    pub fn path_for(&self, record: &TripRecord) -> PathBuf {
        self.root
            .join(&record.vehicle_model)
            .join(record.file_name())
    }
}

impl TripSink for CsvTripWriter {
    fn persist(&self, record: &TripRecord) -> Result<(), StorageError> {
        self.prepare_model_dir(&record.vehicle_model)?;
        let path = self.path_for(record);
        let io_err = |source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = File::create(&path).map_err(io_err)?;
        file.write_all(UTF8_BOM).map_err(io_err)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(record.columns())?;
        for sample in &record.samples {
            writer.write_record(record.row(sample))?;
        }
        writer.flush().map_err(io_err)?;

        info!(
            "Saved trip {} ({} samples)",
            path.display(),
            record.samples.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use telemetry::Sample;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trip-storage-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_writes_bom_header_and_rows() {
        let root = scratch_dir("writer");
        let writer = CsvTripWriter::new(&root);

        let ts = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let samples = vec![Sample::new(ts), Sample::new(ts + chrono::Duration::seconds(1))];
        let record = TripRecord::new("KonaEV", "A100", 1, samples).unwrap();

        writer.persist(&record).unwrap();

        let path = root.join("KonaEV").join("Trip_A100_2024-01_trip_1.csv");
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "time,speed,acceleration,ext_temp,int_temp,soc,soh,pack_volt,pack_current,Power_data"
        );
        assert!(lines[1].starts_with("2024-01-05 18:00:00,0,0,"));

        let _ = fs::remove_dir_all(&root);
    }
}
