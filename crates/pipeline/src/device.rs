//! Per-device processing
//!
//! Clean, align, annotate, segment, validate, tag, persist. Every step
//! works on the data of a single device, so devices run independently.

use crate::config::{ConfigError, DeviceJob, PipelineConfig};
use crate::outcome::{DeviceOutcome, DeviceStatus};
use crate::source::{DeviceData, DeviceSource};
use data_cleaner::{prepare, CleanError, Validator};
use dynamics_model::DynamicsModel;
use metrics::counter;
use sample_aligner::SampleAligner;
use std::collections::{BTreeMap, HashMap};
use telemetry::year_month;
use tracing::{debug, info, warn};
use trip_segmenter::TripSegmenter;
use trip_storage::{MonthlySequencer, TripRecord, TripSink};
use trip_validator::{TripStats, TripValidator};

/// Trips extracted from one device, before persistence
#[derive(Debug, Clone, Default)]
pub struct DeviceTrips {
    pub records: Vec<TripRecord>,
    /// Statistics of each record, same order
    pub stats: Vec<TripStats>,
    pub candidates: usize,
    pub rejections: BTreeMap<&'static str, usize>,
}

/// The stateless per-device stages, shared by every worker
#[derive(Debug, Clone)]
pub struct TripPipeline {
    validator: Validator,
    aligner: SampleAligner,
    segmenter: TripSegmenter,
    trip_validator: TripValidator,
    /// Keyed by lowercase model name
    models: HashMap<String, DynamicsModel>,
}

impl TripPipeline {
    /// Build the stages; invalid vehicle parameters are fatal
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let mut models = HashMap::new();
        for (name, params) in config.vehicle_registry()? {
            let model = DynamicsModel::new(params).map_err(|source| ConfigError::Vehicle {
                model: name.clone(),
                source,
            })?;
            models.insert(name, model);
        }

        let validator = Validator::new(config.validation.clone());
        Ok(Self {
            aligner: SampleAligner::new(config.aligner.clone(), validator.clone()),
            validator,
            segmenter: TripSegmenter::new(config.segmenter.clone()),
            trip_validator: TripValidator::new(config.thresholds.clone()),
            models,
        })
    }

    /// Dynamics model of a vehicle model, ignoring case
    pub fn model_for(&self, vehicle_model: &str) -> Option<&DynamicsModel> {
        self.models.get(&vehicle_model.to_lowercase())
    }

    /// Turn the raw data of one device into tagged trips
    pub fn build_trips(&self, job: &DeviceJob, data: DeviceData) -> Result<DeviceTrips, CleanError> {
        let samples = prepare(data.samples, &self.validator)?;
        let mut samples = self.aligner.align(&samples, data.positional);

        match self.model_for(&job.vehicle_model) {
            Some(model) => model.annotate(&mut samples),
            None => warn!(
                "No parameters for vehicle model {}; modeled power omitted",
                job.vehicle_model
            ),
        }

        let candidates = self.segmenter.candidates(&samples);
        let mut trips = DeviceTrips {
            candidates: candidates.len(),
            ..DeviceTrips::default()
        };

        let mut sequencer = MonthlySequencer::new();
        for candidate in candidates {
            match self.trip_validator.check(candidate.samples) {
                Ok(stats) => {
                    let month = year_month(candidate.samples[0].timestamp);
                    let sequence = sequencer.next(&month);
                    if let Some(record) = TripRecord::new(
                        job.vehicle_model.as_str(),
                        job.device_id.as_str(),
                        sequence,
                        candidate.samples.to_vec(),
                    ) {
                        trips.records.push(record);
                        trips.stats.push(stats);
                    }
                }
                Err(rejection) => {
                    debug!("Rejected samples {:?}: {}", candidate.range, rejection);
                    *trips.rejections.entry(rejection.reason()).or_insert(0) += 1;
                }
            }
        }

        info!(
            "Device {}: {} of {} candidates accepted",
            job,
            trips.records.len(),
            trips.candidates
        );
        Ok(trips)
    }
}

/// Load, build and persist the trips of one device
///
/// Trips are persisted in order. A persist error fails the device; trips
/// written before it stay in the sink and the failure reason says how many.
pub fn process_device(
    pipeline: &TripPipeline,
    source: &dyn DeviceSource,
    sink: &dyn TripSink,
    job: &DeviceJob,
) -> DeviceOutcome {
    let outcome = run_device(pipeline, source, sink, job);
    counter!("ev_trip_devices_total", "outcome" => outcome.label()).increment(1);
    outcome
}

fn run_device(
    pipeline: &TripPipeline,
    source: &dyn DeviceSource,
    sink: &dyn TripSink,
    job: &DeviceJob,
) -> DeviceOutcome {
    let data = match source.load(&job.device_id) {
        Ok(data) if data.is_empty() => {
            warn!("Device {} has no BMS data", job);
            return DeviceOutcome::skipped(job.clone(), "no BMS data");
        }
        Ok(data) => data,
        Err(e) if e.is_data_quality() => {
            warn!("Skipping device {}: {}", job, e);
            return DeviceOutcome::skipped(job.clone(), e.to_string());
        }
        Err(e) => {
            warn!("Failed to load device {}: {}", job, e);
            return DeviceOutcome::failed(job.clone(), e.to_string());
        }
    };

    let trips = match pipeline.build_trips(job, data) {
        Ok(trips) => trips,
        Err(e) => {
            warn!("Skipping device {}: {}", job, e);
            return DeviceOutcome::skipped(job.clone(), e.to_string());
        }
    };

    let total = trips.records.len();
    for (written, record) in trips.records.iter().enumerate() {
        if let Err(e) = sink.persist(record) {
            warn!(
                "Failed to persist {}: {} ({} of {} trips already written)",
                record.file_name(),
                e,
                written,
                total
            );
            return DeviceOutcome::failed(
                job.clone(),
                format!("{} ({} of {} trips persisted)", e, written, total),
            );
        }
    }

    counter!("ev_trip_candidates_total").increment(trips.candidates as u64);
    counter!("ev_trip_trips_accepted_total").increment(trips.records.len() as u64);
    for (reason, count) in &trips.rejections {
        counter!("ev_trip_trips_rejected_total", "reason" => *reason).increment(*count as u64);
    }

    DeviceOutcome {
        job: job.clone(),
        status: DeviceStatus::Success {
            trips: trips.records.len(),
            candidates: trips.candidates,
            rejections: trips
                .rejections
                .into_iter()
                .map(|(reason, count)| (reason.to_string(), count))
                .collect(),
        },
    }
}
