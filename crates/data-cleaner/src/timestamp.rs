//! Timestamp Format Detection

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

/// Formats the BMS exporters are known to write, tried in order
pub const BMS_TIME_FORMATS: [&str; 2] = ["%y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Format of the positional exports
const POSITIONAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layouts accepted row by row once no single format covers the column
const LENIENT_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y%m%d%H%M%S",
];

/// How a column of timestamp strings is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampParser {
    /// Every row parses with this format
    Fixed(&'static str),
    /// Rows are parsed one by one; unparseable rows are dropped by the caller
    Lenient,
}

impl TimestampParser {
    /// Pick the first known format that parses every row of the column
    pub fn detect<S: AsRef<str>>(values: &[S]) -> Self {
        if !values.is_empty() {
            for format in BMS_TIME_FORMATS {
                if values
                    .iter()
                    .all(|v| NaiveDateTime::parse_from_str(v.as_ref().trim(), format).is_ok())
                {
                    debug!("Detected timestamp format {}", format);
                    return TimestampParser::Fixed(format);
                }
            }
        }

        warn!("No fixed timestamp format matched; falling back to per-row parsing");
        TimestampParser::Lenient
    }

    /// Parse one value, `None` when unparseable
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        match self {
            TimestampParser::Fixed(format) => NaiveDateTime::parse_from_str(value, format).ok(),
            TimestampParser::Lenient => parse_lenient(value),
        }
    }
}

/// Parse a positional-stream timestamp, `None` when unparseable
pub fn parse_positional_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), POSITIONAL_TIME_FORMAT).ok()
}

fn parse_lenient(value: &str) -> Option<NaiveDateTime> {
    if value.is_empty() {
        return None;
    }

    LENIENT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
