//! EV Trip Pipeline - Command Line Entry Point

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pipeline::{
    init_logging, worker_count, CsvDirectorySource, DeviceSource, Fleet, FleetRunner,
    PipelineConfig, TripPipeline,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use trip_storage::{CsvTripWriter, Repository, TripReport, TripSink};

#[derive(Parser, Debug)]
#[command(name = "ev-trip", version, about = "Extract validated EV trips from BMS telemetry")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract trips for the selected vehicle models
    Run {
        /// Vehicle models to process
        models: Vec<String>,

        /// Process every model in the vehicle registry
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "models")]
        all: bool,

        /// Keep trips in memory instead of writing files
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,

        /// Write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Worker count, overriding the configured value
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Count persisted trips by device, model and month
    Report {
        /// Report path (defaults to `<report dir>/trip_report.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the vehicle models in the registry
    Models,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.json_logs) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            models,
            all,
            dry_run,
            summary,
            workers,
        } => run(&config, models, all, dry_run, summary.as_deref(), workers).await,
        Command::Report { output } => report(&config, output),
        Command::Models => {
            let fleet = Fleet::load(&config.paths.fleet_file)?;
            for model in fleet.model_names() {
                let devices = fleet.models.get(model).map(Vec::len).unwrap_or(0);
                println!("{} ({} devices)", model, devices);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    config: &PipelineConfig,
    models: Vec<String>,
    all: bool,
    dry_run: bool,
    summary_path: Option<&Path>,
    workers: Option<usize>,
) -> Result<ExitCode> {
    info!("=== EV Trip Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let fleet = Fleet::load(&config.paths.fleet_file)?;
    let jobs = if all {
        fleet.all_jobs()
    } else if models.is_empty() {
        bail!(
            "no vehicle models selected; pass model names or --all (available: {})",
            fleet.model_names().join(", ")
        );
    } else {
        fleet.jobs(&models)
    };
    if jobs.is_empty() {
        warn!("No devices to process");
        return Ok(ExitCode::SUCCESS);
    }

    let pipeline = TripPipeline::new(config)?;
    let source: Arc<dyn DeviceSource> = Arc::new(CsvDirectorySource::new(
        &config.paths.raw_bms_dir,
        &config.paths.raw_gps_dir,
    ));
    let dry_run_store = dry_run.then(|| Arc::new(Repository::new()));
    let sink: Arc<dyn TripSink> = if let Some(store) = &dry_run_store {
        info!("Dry run: no trip files are written");
        store.clone()
    } else {
        let writer = CsvTripWriter::new(&config.paths.output_trip_dir);
        let mut selected: Vec<&str> = jobs.iter().map(|j| j.vehicle_model.as_str()).collect();
        selected.dedup();
        for model in selected {
            writer.prepare_model_dir(model)?;
        }
        Arc::new(writer)
    };

    let workers = workers
        .or(config.workers.count)
        .unwrap_or_else(|| worker_count(config.workers.reserve));
    let runner = FleetRunner::new(pipeline, source, sink, workers);
    let summary = runner.run(jobs).await;

    for failure in summary.failures() {
        warn!("Device {} failed: {:?}", failure.job, failure.status);
    }
    if let Some(store) = &dry_run_store {
        let names = store.file_names();
        for (model, file_name) in &names {
            println!("would write {}/{}", model, file_name);
        }
        let preview = TripReport::from_entries(names);
        for (model, counts) in &preview.models {
            println!(
                "{}: {} trips, {} with altitude",
                model, counts.total_trips, counts.altitude_trips
            );
        }
    }
    if let Some(path) = summary_path {
        summary.write_json(path)?;
    }

    println!(
        "{} devices: {} succeeded, {} skipped, {} failed; {} trips from {} candidates",
        summary.devices,
        summary.succeeded,
        summary.skipped,
        summary.failed,
        summary.trips,
        summary.candidates
    );
    Ok(ExitCode::SUCCESS)
}

fn report(config: &PipelineConfig, output: Option<PathBuf>) -> Result<ExitCode> {
    let report = TripReport::scan(&config.paths.output_trip_dir)
        .with_context(|| format!("scanning {}", config.paths.output_trip_dir.display()))?;

    let path = match output {
        Some(path) => path,
        None => {
            fs::create_dir_all(&config.paths.output_report_dir).with_context(|| {
                format!("creating {}", config.paths.output_report_dir.display())
            })?;
            config.paths.output_report_dir.join("trip_report.json")
        }
    };
    report.write_json(&path)?;

    println!(
        "{} trips across {} devices",
        report.total_trips(),
        report.devices.len()
    );
    Ok(ExitCode::SUCCESS)
}
