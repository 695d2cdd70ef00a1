//! Device data sources
//!
//! A source hands the runner the raw BMS rows and positional records of one
//! device. [`CsvDirectorySource`] reads the on-disk export layout and
//! [`MemorySource`] serves prepared data.

use data_cleaner::{parse_positional_timestamp, CleanError, TimestampParser};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use telemetry::{CableState, PositionalSample, RawSample};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Columns every BMS file must carry
pub const REQUIRED_BMS_COLUMNS: [&str; 4] = ["time", "emobility_spd", "pack_volt", "pack_current"];

/// Source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no BMS files found for device {0}")]
    NoFiles(String),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Data-quality conditions that skip a device rather than fail it
    pub fn is_data_quality(&self) -> bool {
        matches!(self, SourceError::NoFiles(_) | SourceError::Clean(_))
    }
}

/// Raw inputs of one device
#[derive(Debug, Clone, Default)]
pub struct DeviceData {
    pub samples: Vec<RawSample>,
    /// Positional stream, empty when the device has none
    pub positional: Vec<PositionalSample>,
}

impl DeviceData {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Provider of per-device raw data
pub trait DeviceSource: Send + Sync {
    fn load(&self, device_id: &str) -> Result<DeviceData, SourceError>;
}

/// Serves device data held in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    devices: HashMap<String, DeviceData>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device_id: impl Into<String>, data: DeviceData) {
        self.devices.insert(device_id.into(), data);
    }

    pub fn with_device(mut self, device_id: impl Into<String>, data: DeviceData) -> Self {
        self.insert(device_id, data);
        self
    }
}

impl DeviceSource for MemorySource {
    fn load(&self, device_id: &str) -> Result<DeviceData, SourceError> {
        self.devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| SourceError::NoFiles(device_id.to_string()))
    }
}

/// Reads device exports from disk
///
/// BMS files are the `*.csv` files anywhere under the BMS root whose name
/// contains the device id. Positional files are the `*.csv` files under
/// `<gps root>/<device id>/`.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    bms_root: PathBuf,
    gps_root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(bms_root: impl Into<PathBuf>, gps_root: impl Into<PathBuf>) -> Self {
        Self {
            bms_root: bms_root.into(),
            gps_root: gps_root.into(),
        }
    }

    fn bms_files(&self, device_id: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_csv_files(&self.bms_root, &mut files);
        files.retain(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.contains(device_id))
        });
        files.sort();
        files
    }

    fn gps_files(&self, device_id: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_csv_files(&self.gps_root.join(device_id), &mut files);
        files.sort();
        files
    }

    fn load_bms(&self, device_id: &str) -> Result<Vec<RawSample>, SourceError> {
        let files = self.bms_files(device_id);
        if files.is_empty() {
            return Err(SourceError::NoFiles(device_id.to_string()));
        }

        let mut rows = Vec::new();
        let mut missing = Vec::new();
        for path in &files {
            match read_table(path) {
                Ok(table) => match BmsColumns::locate(&table.headers) {
                    Ok(columns) => rows.extend(table.rows.iter().map(|r| columns.extract(r))),
                    Err(absent) => {
                        warn!("Skipping {}: missing columns {:?}", path.display(), absent);
                        missing.extend(absent);
                    }
                },
                Err(e) => warn!("Skipping unreadable file {}: {}", path.display(), e),
            }
        }

        if rows.is_empty() {
            if !missing.is_empty() {
                missing.sort();
                missing.dedup();
                return Err(CleanError::MissingColumns(missing).into());
            }
            return Err(CleanError::Empty.into());
        }

        let times: Vec<&str> = rows.iter().map(|r| r.time.as_str()).collect();
        let parser = TimestampParser::detect(&times);
        debug!("Device {} timestamp format: {:?}", device_id, parser);

        let total = rows.len();
        let samples: Vec<RawSample> = rows
            .into_iter()
            .filter_map(|row| row.into_raw(&parser))
            .collect();
        if samples.is_empty() {
            return Err(CleanError::NoValidTimestamps.into());
        }
        if samples.len() < total {
            warn!(
                "Device {}: dropped {} rows with unparseable timestamps",
                device_id,
                total - samples.len()
            );
        }
        Ok(samples)
    }

    fn load_positional(&self, device_id: &str) -> Vec<PositionalSample> {
        let mut records = Vec::new();
        for path in self.gps_files(device_id) {
            let table = match read_table(&path) {
                Ok(table) => table,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", path.display(), e);
                    continue;
                }
            };
            let Some(time) = column(&table.headers, "time") else {
                warn!("Skipping {}: no time column", path.display());
                continue;
            };
            let altitude = column(&table.headers, "altitude");
            let lat = column(&table.headers, "lat");
            let lng = column(&table.headers, "lng");

            records.extend(table.rows.iter().filter_map(|row| {
                let timestamp = parse_positional_timestamp(field(row, Some(time))?)?;
                Some(PositionalSample {
                    timestamp,
                    altitude: number(row, altitude),
                    lat: number(row, lat),
                    lng: number(row, lng),
                })
            }));
        }
        records
    }
}

impl DeviceSource for CsvDirectorySource {
    fn load(&self, device_id: &str) -> Result<DeviceData, SourceError> {
        let samples = self.load_bms(device_id)?;
        let positional = self.load_positional(device_id);
        info!(
            "Loaded device {}: {} BMS rows, {} positional rows",
            device_id,
            samples.len(),
            positional.len()
        );
        Ok(DeviceData {
            samples,
            positional,
        })
    }
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_csv_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            out.push(path);
        }
    }
}

struct Table {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

/// Read a CSV file as UTF-8, falling back to ISO-8859-1
fn read_table(path: &Path) -> Result<Table, SourceError> {
    let bytes = fs::read(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let text = decode(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.iter().map(|h| h.trim().to_string()).collect(),
        Err(e) => {
            warn!("No header row in {}: {}", path.display(), e);
            Vec::new()
        }
    };
    let rows = reader
        .records()
        .filter_map(|record| match record {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping malformed row in {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    Ok(Table { headers, rows })
}

fn decode(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn field(row: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    row.get(index?).filter(|v| !v.is_empty())
}

fn number(row: &csv::StringRecord, index: Option<usize>) -> Option<f64> {
    field(row, index)?.parse().ok()
}

/// Column positions of one BMS file
struct BmsColumns {
    time: usize,
    speed: usize,
    volt: usize,
    current: usize,
    soc: Option<usize>,
    soh: Option<usize>,
    ext_temp: Option<usize>,
    int_temp: Option<usize>,
    cable: Option<usize>,
    altitude: Option<usize>,
}

impl BmsColumns {
    fn locate(headers: &[String]) -> Result<Self, Vec<String>> {
        let absent: Vec<String> = REQUIRED_BMS_COLUMNS
            .iter()
            .filter(|name| column(headers, name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !absent.is_empty() {
            return Err(absent);
        }

        let required = |name| column(headers, name).ok_or_else(|| vec![name.to_string()]);
        Ok(Self {
            time: required("time")?,
            speed: required("emobility_spd")?,
            volt: required("pack_volt")?,
            current: required("pack_current")?,
            soc: column(headers, "soc"),
            soh: column(headers, "soh"),
            ext_temp: column(headers, "ext_temp"),
            int_temp: column(headers, "int_temp"),
            cable: column(headers, "chrg_cable_conn"),
            altitude: column(headers, "altitude"),
        })
    }

    fn extract(&self, row: &csv::StringRecord) -> BmsRow {
        // Unreadable required readings become NaN and fail validation later
        let required = |index| number(row, Some(index)).unwrap_or(f64::NAN);
        BmsRow {
            time: row.get(self.time).unwrap_or_default().to_string(),
            speed_kmh: required(self.speed),
            pack_volt: required(self.volt),
            pack_current: required(self.current),
            soc: number(row, self.soc),
            soh: number(row, self.soh),
            ext_temp: number(row, self.ext_temp),
            int_temp: number(row, self.int_temp),
            cable: CableState::from_raw(number(row, self.cable)),
            altitude: number(row, self.altitude),
        }
    }
}

/// A BMS row whose timestamp is still text
struct BmsRow {
    time: String,
    speed_kmh: f64,
    pack_volt: f64,
    pack_current: f64,
    soc: Option<f64>,
    soh: Option<f64>,
    ext_temp: Option<f64>,
    int_temp: Option<f64>,
    cable: CableState,
    altitude: Option<f64>,
}

impl BmsRow {
    fn into_raw(self, parser: &TimestampParser) -> Option<RawSample> {
        let timestamp = parser.parse(&self.time)?;
        Some(RawSample {
            timestamp,
            speed_kmh: self.speed_kmh,
            pack_volt: self.pack_volt,
            pack_current: self.pack_current,
            soc: self.soc,
            soh: self.soh,
            ext_temp: self.ext_temp,
            int_temp: self.int_temp,
            cable: self.cable,
            altitude: self.altitude,
        })
    }
}
