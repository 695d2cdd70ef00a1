//! Parallel device runner
//!
//! Devices are independent, so each one runs as a blocking task on the tokio
//! blocking pool. A semaphore caps how many run at once. A panic or error in
//! one device becomes a `Failed` outcome and never stops the others.

use crate::config::DeviceJob;
use crate::device::{process_device, TripPipeline};
use crate::outcome::{DeviceOutcome, RunSummary};
use crate::source::DeviceSource;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span};
use trip_storage::TripSink;

/// Number of workers: available cores minus `reserve`, at least one
pub fn worker_count(reserve: usize) -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(reserve)
        .max(1)
}

/// Shared state handed to every worker
#[derive(Clone)]
pub struct FleetRunner {
    pipeline: Arc<TripPipeline>,
    source: Arc<dyn DeviceSource>,
    sink: Arc<dyn TripSink>,
    workers: usize,
}

impl FleetRunner {
    pub fn new(
        pipeline: TripPipeline,
        source: Arc<dyn DeviceSource>,
        sink: Arc<dyn TripSink>,
        workers: usize,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            source,
            sink,
            workers: workers.max(1),
        }
    }

    /// Process every job and reduce the outcomes into a summary
    ///
    /// Outcomes arrive in completion order.
    pub async fn run(&self, jobs: Vec<DeviceJob>) -> RunSummary {
        let started = Instant::now();
        info!(
            "Processing {} devices with {} workers",
            jobs.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for job in jobs {
            let runner = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move { runner.run_one(job, semaphore).await });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                // run_one never panics itself; only cancellation lands here
                Err(e) => error!("Device task aborted: {}", e),
            }
        }

        info!(
            "Run finished in {:.1}s: {} succeeded, {} skipped, {} failed, {} trips",
            started.elapsed().as_secs_f64(),
            summary.succeeded,
            summary.skipped,
            summary.failed,
            summary.trips
        );
        summary
    }

    async fn run_one(self, job: DeviceJob, semaphore: Arc<Semaphore>) -> DeviceOutcome {
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return DeviceOutcome::failed(job, "worker pool closed");
        };

        let task_job = job.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let span = info_span!(
                "device",
                model = %task_job.vehicle_model,
                device = %task_job.device_id
            );
            let _guard = span.enter();
            process_device(
                &self.pipeline,
                self.source.as_ref(),
                self.sink.as_ref(),
                &task_job,
            )
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                let reason = panic_reason(e.into_panic());
                error!("Device {} panicked: {}", job, reason);
                DeviceOutcome::failed(job, format!("panicked: {}", reason))
            }
            Err(e) => {
                error!("Device {} was cancelled: {}", job, e);
                DeviceOutcome::failed(job, e.to_string())
            }
        }
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
