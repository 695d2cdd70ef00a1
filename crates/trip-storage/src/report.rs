//! Trip count report over the persisted trip tree

use crate::record::{ALTITUDE_PREFIX, PLAIN_PREFIX};
use crate::StorageError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// Fields recovered from a trip file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripFileName {
    pub device_id: String,
    pub year_month: String,
    pub sequence: u32,
    pub has_altitude: bool,
}

impl TripFileName {
    /// Parse `{prefix}{device}_{year-month}_trip_{sequence}[.csv]`
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
        let (rest, has_altitude) = match stem.strip_prefix(ALTITUDE_PREFIX) {
            Some(rest) => (rest, true),
            None => (stem.strip_prefix(PLAIN_PREFIX)?, false),
        };

        let mut parts = rest.rsplitn(4, '_');
        let sequence = parts.next()?.parse().ok()?;
        if parts.next()? != "trip" {
            return None;
        }
        let year_month = parts.next()?;
        let device_id = parts.next()?;
        if device_id.is_empty() || year_month.len() != 7 {
            return None;
        }

        Some(Self {
            device_id: device_id.to_string(),
            year_month: year_month.to_string(),
            sequence,
            has_altitude,
        })
    }
}

/// Trip counts of one device by month
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceRow {
    pub vehicle_model: String,
    pub device_id: String,
    pub months: BTreeMap<String, usize>,
    pub total: usize,
}

/// Per-model totals
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ModelSummary {
    pub total_trips: usize,
    pub altitude_trips: usize,
    /// Share of trips with altitude (%, one decimal)
    pub altitude_ratio_pct: f64,
}

/// Trip counts by device, model and month
#[derive(Debug, Clone, Default, Serialize)]
pub struct TripReport {
    pub devices: Vec<DeviceRow>,
    pub models: BTreeMap<String, ModelSummary>,
    pub model_months: BTreeMap<String, BTreeMap<String, usize>>,
}

impl TripReport {
    /// Build the report from `(vehicle model, file name)` pairs
    pub fn from_entries<I, M, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (M, F)>,
        M: AsRef<str>,
        F: AsRef<str>,
    {
        let mut devices: BTreeMap<(String, String), BTreeMap<String, usize>> = BTreeMap::new();
        let mut models: BTreeMap<String, ModelSummary> = BTreeMap::new();
        let mut model_months: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

        for (model, file_name) in entries {
            let (model, file_name) = (model.as_ref(), file_name.as_ref());
            let Some(parsed) = TripFileName::parse(file_name) else {
                warn!("Skipping unrecognized trip file name: {}", file_name);
                continue;
            };

            *devices
                .entry((model.to_string(), parsed.device_id.clone()))
                .or_default()
                .entry(parsed.year_month.clone())
                .or_insert(0) += 1;

            let summary = models.entry(model.to_string()).or_default();
            summary.total_trips += 1;
            if parsed.has_altitude {
                summary.altitude_trips += 1;
            }

            *model_months
                .entry(model.to_string())
                .or_default()
                .entry(parsed.year_month)
                .or_insert(0) += 1;
        }

        for summary in models.values_mut() {
            if summary.total_trips > 0 {
                let pct = summary.altitude_trips as f64 / summary.total_trips as f64 * 100.0;
                summary.altitude_ratio_pct = (pct * 10.0).round() / 10.0;
            }
        }

        let devices = devices
            .into_iter()
            .map(|((vehicle_model, device_id), months)| DeviceRow {
                total: months.values().sum(),
                vehicle_model,
                device_id,
                months,
            })
            .collect();

        Self {
            devices,
            models,
            model_months,
        }
    }

    /// Scan `<root>/<vehicle model>/*.csv`
    pub fn scan(root: &Path) -> Result<Self, StorageError> {
        let io_err = |path: &Path, source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        let model_dirs = match fs::read_dir(root) {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Trip directory {} does not exist", root.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(io_err(root, e)),
        };

        let mut entries = Vec::new();
        for model_dir in model_dirs {
            let model_dir = model_dir.map_err(|e| io_err(root, e))?.path();
            if !model_dir.is_dir() {
                continue;
            }
            let Some(model) = model_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for file in fs::read_dir(&model_dir).map_err(|e| io_err(&model_dir, e))? {
                let path = file.map_err(|e| io_err(&model_dir, e))?.path();
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.ends_with(".csv") {
                        entries.push((model.to_string(), name.to_string()));
                    }
                }
            }
        }

        if entries.is_empty() {
            warn!("No trip files found under {}", root.display());
        }
        Ok(Self::from_entries(entries))
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Trip report written to {}", path.display());
        Ok(())
    }

    pub fn total_trips(&self) -> usize {
        self.models.values().map(|m| m.total_trips).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_names() {
        assert_eq!(
            TripFileName::parse("Trip_altitude_0123_2024-03_trip_12.csv"),
            Some(TripFileName {
                device_id: "0123".into(),
                year_month: "2024-03".into(),
                sequence: 12,
                has_altitude: true,
            })
        );

        let plain = TripFileName::parse("Trip_dev_A_2024-03_trip_1.csv").unwrap();
        assert_eq!(plain.device_id, "dev_A");
        assert!(!plain.has_altitude);

        assert!(TripFileName::parse("Trip_0123_2024-03_leg_1.csv").is_none());
        assert!(TripFileName::parse("summary.csv").is_none());
        assert!(TripFileName::parse("Trip_0123_2024-03_trip_x.csv").is_none());
    }

    #[test]
    fn test_report_counts() {
        let entries = vec![
            ("NiroEV", "Trip_d1_2024-01_trip_1.csv"),
            ("NiroEV", "Trip_altitude_d1_2024-01_trip_2.csv"),
            ("NiroEV", "Trip_d1_2024-02_trip_1.csv"),
            ("NiroEV", "Trip_d2_2024-02_trip_1.csv"),
            ("EV6", "Trip_altitude_e1_2024-02_trip_1.csv"),
            ("EV6", "notes.csv"),
        ];
        let report = TripReport::from_entries(entries);

        assert_eq!(report.total_trips(), 5);
        assert_eq!(report.devices.len(), 3);

        let d1 = report
            .devices
            .iter()
            .find(|d| d.device_id == "d1")
            .unwrap();
        assert_eq!(d1.total, 3);
        assert_eq!(d1.months["2024-01"], 2);

        let niro = &report.models["NiroEV"];
        assert_eq!(niro.total_trips, 4);
        assert_eq!(niro.altitude_trips, 1);
        assert_eq!(niro.altitude_ratio_pct, 25.0);
        assert_eq!(report.models["EV6"].altitude_ratio_pct, 100.0);

        assert_eq!(report.model_months["NiroEV"]["2024-02"], 2);
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let root = std::env::temp_dir().join(format!("trip-report-missing-{}", std::process::id()));
        let report = TripReport::scan(&root).unwrap();
        assert_eq!(report.total_trips(), 0);
        assert!(report.devices.is_empty());
    }

    #[test]
    fn test_scan_reads_model_dirs() {
        let root = std::env::temp_dir().join(format!("trip-report-scan-{}", std::process::id()));
        let model_dir = root.join("EV6");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("Trip_e1_2024-02_trip_1.csv"), "").unwrap();
        fs::write(model_dir.join("readme.txt"), "").unwrap();

        let report = TripReport::scan(&root).unwrap();
        assert_eq!(report.total_trips(), 1);
        assert_eq!(report.models["EV6"].total_trips, 1);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_ratio_rounds_to_one_decimal() {
        let entries = vec![
            ("Ioniq6", "Trip_altitude_x_2024-01_trip_1.csv"),
            ("Ioniq6", "Trip_x_2024-01_trip_2.csv"),
            ("Ioniq6", "Trip_x_2024-01_trip_3.csv"),
        ];
        let report = TripReport::from_entries(entries);
        assert_eq!(report.models["Ioniq6"].altitude_ratio_pct, 33.3);
    }
}
