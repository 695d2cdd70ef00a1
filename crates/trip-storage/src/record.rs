//! Trip records and their persisted layout

use serde::Serialize;
use std::collections::HashMap;
use telemetry::{year_month, Sample};

/// File prefix of trips without altitude data
pub const PLAIN_PREFIX: &str = "Trip_";
/// File prefix of trips with altitude data
pub const ALTITUDE_PREFIX: &str = "Trip_altitude_";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An accepted trip, tagged for persistence
#[derive(Debug, Clone, Serialize)]
pub struct TripRecord {
    pub vehicle_model: String,
    pub device_id: String,
    /// `YYYY-MM` of the first sample
    pub year_month: String,
    /// 1-based position among the device's trips of that month
    pub sequence: u32,
    /// Altitude present on at least one sample
    pub has_altitude: bool,
    pub samples: Vec<Sample>,
}

impl TripRecord {
    /// Tag a trip; `None` when `samples` is empty
    pub fn new(
        vehicle_model: impl Into<String>,
        device_id: impl Into<String>,
        sequence: u32,
        samples: Vec<Sample>,
    ) -> Option<Self> {
        let first = samples.first()?;
        Some(Self {
            vehicle_model: vehicle_model.into(),
            device_id: device_id.into(),
            year_month: year_month(first.timestamp),
            sequence,
            has_altitude: samples.iter().any(|s| s.altitude.is_some()),
            samples,
        })
    }

    pub fn prefix(&self) -> &'static str {
        if self.has_altitude {
            ALTITUDE_PREFIX
        } else {
            PLAIN_PREFIX
        }
    }

    /// `{prefix}{device_id}_{year-month}_trip_{sequence}`
    pub fn file_stem(&self) -> String {
        format!(
            "{}{}_{}_trip_{}",
            self.prefix(),
            self.device_id,
            self.year_month,
            self.sequence
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.file_stem())
    }

    /// Whether the dynamics model annotated this trip
    pub fn has_modeled_power(&self) -> bool {
        self.samples.iter().any(|s| s.modeled_power.is_some())
    }

    /// Persisted column order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![
            "time",
            "speed",
            "acceleration",
            "ext_temp",
            "int_temp",
            "soc",
            "soh",
        ];
        if self.has_altitude {
            columns.push("altitude");
        }
        columns.extend(["pack_volt", "pack_current", "Power_data"]);
        if self.has_modeled_power() {
            columns.push("Power_phys");
        }
        columns
    }

    /// One sample formatted in [`columns`](Self::columns) order
    pub fn row(&self, sample: &Sample) -> Vec<String> {
        let mut row = vec![
            sample.timestamp.format(TIME_FORMAT).to_string(),
            sample.speed.to_string(),
            sample.acceleration.to_string(),
            optional(sample.ext_temp),
            optional(sample.int_temp),
            optional(sample.soc),
            optional(sample.soh),
        ];
        if self.has_altitude {
            row.push(optional(sample.altitude));
        }
        row.extend([
            sample.pack_volt.to_string(),
            sample.pack_current.to_string(),
            sample.measured_power.to_string(),
        ]);
        if self.has_modeled_power() {
            row.push(optional(sample.modeled_power));
        }
        row
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Hands out per-month trip sequence numbers for one device
#[derive(Debug, Default)]
pub struct MonthlySequencer {
    counters: HashMap<String, u32>,
}

impl MonthlySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number for `year_month`, starting at 1
    pub fn next(&mut self, year_month: &str) -> u32 {
        let counter = self.counters.entry(year_month.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(day: u32) -> Sample {
        let mut s = Sample::new(
            NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        s.speed = 8.5;
        s.pack_volt = 390.0;
        s.pack_current = 10.0;
        s.measured_power = 3900.0;
        s
    }

    #[test]
    fn test_plain_file_name_and_columns() {
        let record = TripRecord::new("Ioniq5", "01241228177", 3, vec![sample(2)]).unwrap();

        assert_eq!(record.file_name(), "Trip_01241228177_2024-05_trip_3.csv");
        assert!(!record.columns().contains(&"altitude"));
        assert!(!record.columns().contains(&"Power_phys"));
        assert_eq!(record.row(&record.samples[0]).len(), record.columns().len());
    }

    #[test]
    fn test_altitude_variant() {
        let mut with_alt = sample(2);
        with_alt.altitude = Some(42.0);
        with_alt.modeled_power = Some(1234.5);
        let record = TripRecord::new("EV6", "dev9", 1, vec![sample(2), with_alt]).unwrap();

        assert!(record.has_altitude);
        assert_eq!(record.file_stem(), "Trip_altitude_dev9_2024-05_trip_1");
        assert_eq!(
            record.columns(),
            vec![
                "time",
                "speed",
                "acceleration",
                "ext_temp",
                "int_temp",
                "soc",
                "soh",
                "altitude",
                "pack_volt",
                "pack_current",
                "Power_data",
                "Power_phys",
            ]
        );

        let row = record.row(&record.samples[0]);
        assert_eq!(row[0], "2024-05-02 09:00:00");
        assert_eq!(row[7], "");
        assert_eq!(row[10], "3900");
        assert_eq!(row[11], "");
    }

    #[test]
    fn test_empty_trip_has_no_record() {
        assert!(TripRecord::new("EV6", "dev9", 1, Vec::new()).is_none());
    }

    #[test]
    fn test_sequence_restarts_each_month() {
        let mut seq = MonthlySequencer::new();
        assert_eq!(seq.next("2024-05"), 1);
        assert_eq!(seq.next("2024-05"), 2);
        assert_eq!(seq.next("2024-06"), 1);
        assert_eq!(seq.next("2024-05"), 3);
    }
}
