//! Per-device outcomes and the run summary

use crate::config::DeviceJob;
use crate::PipelineError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// How processing one device ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    Success {
        trips: usize,
        candidates: usize,
        /// Rejected candidates by reason
        rejections: BTreeMap<String, usize>,
    },
    /// Nothing usable to process
    Skipped { reason: String },
    /// Unexpected error or panic while processing
    Failed { reason: String },
}

/// Outcome of one device job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceOutcome {
    #[serde(flatten)]
    pub job: DeviceJob,
    #[serde(flatten)]
    pub status: DeviceStatus,
}

impl DeviceOutcome {
    pub fn skipped(job: DeviceJob, reason: impl Into<String>) -> Self {
        Self {
            job,
            status: DeviceStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(job: DeviceJob, reason: impl Into<String>) -> Self {
        Self {
            job,
            status: DeviceStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    /// Label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self.status {
            DeviceStatus::Success { .. } => "success",
            DeviceStatus::Skipped { .. } => "skipped",
            DeviceStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, DeviceStatus::Failed { .. })
    }
}

/// Aggregate over every device of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub devices: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub trips: usize,
    pub candidates: usize,
    pub rejections: BTreeMap<String, usize>,
    pub outcomes: Vec<DeviceOutcome>,
}

impl RunSummary {
    /// Fold one device outcome into the totals
    pub fn record(&mut self, outcome: DeviceOutcome) {
        self.devices += 1;
        match &outcome.status {
            DeviceStatus::Success {
                trips,
                candidates,
                rejections,
            } => {
                self.succeeded += 1;
                self.trips += trips;
                self.candidates += candidates;
                for (reason, count) in rejections {
                    *self.rejections.entry(reason.clone()).or_insert(0) += count;
                }
            }
            DeviceStatus::Skipped { .. } => self.skipped += 1,
            DeviceStatus::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Outcomes of failed devices
    pub fn failures(&self) -> impl Iterator<Item = &DeviceOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Run summary written to {}", path.display());
        Ok(())
    }
}
