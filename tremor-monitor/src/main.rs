//! # Tremor Monitor - Continuous Tremor Monitoring
//!
//! Host-side driver for the tremor detection core. Runs repeated analysis
//! cycles against a simulated wristband, keeps the detection thresholds in
//! sync with a JSON threshold document, and reports each result.
//!
//! ## Architecture
//! - **Main Thread**: result reporting, threshold sync, progress logging
//! - **Analysis Thread**: owns the `TremorDetector` and runs cycles back to back
//! - **Communication**: Crossbeam channels for results and shutdown

mod config_sync;
mod simulator;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender, never, select, tick};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use tremor_core::acquisition::ProgressHandle;
use tremor_core::detection::severity_label;
use tremor_core::{
    AcquisitionSettings, Clock, ConfigStore, DetectionResult, ManualClock, Outcome, Statistics,
    SystemClock, TremorDetector,
};

use config_sync::{SyncStatus, sync_from_file};
use simulator::{SimulatedWrist, WristProfile};

/// How often acquisition progress is logged in real-time mode.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "tremor-monitor")]
#[command(about = "Continuous tremor monitoring against a simulated wristband")]
#[command(version)]
struct CliArgs {
    /// JSON threshold document; re-read periodically and applied when its version increases
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds between threshold document re-syncs
    #[arg(long, default_value = "30")]
    sync_interval_secs: u64,

    /// Number of analysis cycles to run (0 = run until stopped)
    #[arg(long, default_value = "10")]
    cycles: u64,

    /// Minimum time between the starts of two analyses (ms)
    #[arg(long, default_value = "2500")]
    interval_ms: u64,

    /// Use a virtual clock: no real-time waiting during acquisition
    #[arg(long)]
    fast: bool,

    /// Print each result as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Accelerometer sensitivity in LSB/g (2048 = ±16 g range)
    #[arg(long, default_value = "2048")]
    sensitivity: f32,

    /// Simulated tremor frequency (Hz)
    #[arg(long, default_value = "5.0")]
    sim_frequency: f32,

    /// Simulated tremor RMS amplitude (g)
    #[arg(long, default_value = "3.2")]
    sim_rms: f32,

    /// Standard deviation of the simulated per-axis noise (g)
    #[arg(long, default_value = "0.05", value_parser = parse_noise)]
    sim_noise: f32,

    /// Probability that a simulated sensor read fails
    #[arg(long, default_value = "0.0", value_parser = parse_probability)]
    sim_dropout: f64,

    /// Seed for the simulated noise
    #[arg(long, default_value = "1")]
    seed: u64,
}

fn parse_probability(s: &str) -> std::result::Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{s} is not a probability in [0, 1]"))
    }
}

fn parse_noise(s: &str) -> std::result::Result<f32, String> {
    let g: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if g.is_finite() && g >= 0.0 {
        Ok(g)
    } else {
        Err(format!("{s} is not a finite, non-negative noise level"))
    }
}

/// One JSON output line per analysis cycle.
#[derive(Serialize)]
struct ResultLine<'a> {
    outcome: Outcome,
    severity_label: &'static str,
    #[serde(flatten)]
    result: &'a DetectionResult,
}

/// Final JSON output line.
#[derive(Serialize)]
struct SummaryLine {
    statistics: Statistics,
    detection_rate: f32,
}

/// Handle on the analysis thread.
struct AnalysisWorker {
    shutdown_tx: Sender<()>,
    thread_handle: JoinHandle<Statistics>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    run(args)
}

fn run(args: CliArgs) -> Result<()> {
    let store = Arc::new(ConfigStore::default());
    if let Some(path) = &args.config {
        match sync_from_file(path, &store) {
            SyncStatus::Applied { .. } | SyncStatus::NoUpdate { .. } => {}
            status => return Err(anyhow!("initial threshold load from {}: {status}", path.display())),
        }
    }

    let settings = AcquisitionSettings {
        accel_sensitivity: args.sensitivity,
        ..AcquisitionSettings::default()
    };
    let clock: Box<dyn Clock> = if args.fast {
        Box::new(ManualClock::new())
    } else {
        Box::new(SystemClock::new())
    };

    let mut detector = TremorDetector::new(settings.clone(), Arc::clone(&store), clock)
        .context("invalid acquisition settings")?;
    let profile = WristProfile {
        tremor_frequency_hz: args.sim_frequency,
        tremor_rms_g: args.sim_rms,
        bias_g: 1.0 + args.sim_rms * std::f32::consts::SQRT_2,
        noise_g: args.sim_noise,
        dropout: args.sim_dropout,
        seed: args.seed,
    };
    detector.register_sensor(Box::new(SimulatedWrist::new(
        &profile,
        settings.sample_rate_hz as f32,
        settings.accel_sensitivity,
    )));

    let progress = detector.progress();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    let pause = if args.fast {
        Duration::ZERO
    } else {
        Duration::from_millis(args.interval_ms).saturating_sub(settings.collection_time())
    };
    let worker = start_analysis(detector, args.cycles, pause, result_tx);

    let report = report_results(&args, &store, &result_rx, &progress);

    // Stop the worker whether reporting ended normally or not.
    let _ = worker.shutdown_tx.send(());
    drop(result_rx);
    let stats = worker
        .thread_handle
        .join()
        .map_err(|_| anyhow!("analysis thread panicked"))?;
    report?;

    info!(
        total = stats.total_analyses,
        tremors = stats.tremor_count,
        avg_frequency_hz = stats.avg_frequency,
        avg_rms_g = stats.avg_amplitude,
        max_severity = severity_label(stats.max_severity),
        "monitoring finished"
    );
    if args.json {
        let summary = SummaryLine { statistics: stats, detection_rate: stats.detection_rate() };
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

/// Spawns the analysis thread.
///
/// The thread runs `cycles` analyses (forever when 0), waiting `pause`
/// between them, and returns the final statistics. It stops early when the
/// shutdown channel fires or the result receiver goes away.
fn start_analysis(
    mut detector: TremorDetector,
    cycles: u64,
    pause: Duration,
    result_tx: Sender<DetectionResult>,
) -> AnalysisWorker {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let thread_handle = thread::spawn(move || {
        info!(cycles, "analysis thread started");
        let mut completed = 0u64;
        while cycles == 0 || completed < cycles {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let result = detector.analyze();
            completed += 1;
            if result_tx.send(result).is_err() {
                warn!("result receiver closed, stopping analysis");
                break;
            }
            if completed == cycles {
                break;
            }
            select! {
                recv(shutdown_rx) -> _ => break,
                default(pause) => {}
            }
        }
        info!(completed, "analysis thread finished");
        detector.statistics()
    });

    AnalysisWorker { shutdown_tx, thread_handle }
}

/// Consumes results until the analysis thread hangs up, re-syncing the
/// threshold document and logging acquisition progress along the way.
fn report_results(
    args: &CliArgs,
    store: &ConfigStore,
    results: &Receiver<DetectionResult>,
    progress: &ProgressHandle,
) -> Result<()> {
    let sync_ticker = match &args.config {
        Some(_) => tick(Duration::from_secs(args.sync_interval_secs.max(1))),
        None => never(),
    };
    let progress_ticker = if args.fast { never() } else { tick(PROGRESS_LOG_INTERVAL) };

    loop {
        select! {
            recv(results) -> msg => match msg {
                Ok(result) => emit(&result, args.json)?,
                Err(_) => return Ok(()),
            },
            recv(sync_ticker) -> _ => {
                if let Some(path) = &args.config {
                    let status = sync_from_file(path, store);
                    debug!(%status, "threshold sync");
                }
            },
            recv(progress_ticker) -> _ => {
                debug!(percent = progress.get(), "acquisition progress");
            },
        }
    }
}

/// Reports one analysis result.
fn emit(result: &DetectionResult, json: bool) -> Result<()> {
    if json {
        let line = ResultLine {
            outcome: result.outcome(),
            severity_label: result.severity_label(),
            result,
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    match result.outcome() {
        Outcome::OutOfRange => warn!(
            rms_g = result.rms_amplitude,
            "motion exceeds the detection range, result discarded"
        ),
        Outcome::Detected => info!(
            frequency_hz = result.frequency,
            rms_g = result.rms_amplitude,
            peak_ratio = result.peak_ratio,
            severity = result.severity,
            label = result.severity_label(),
            "tremor detected"
        ),
        Outcome::NotDetected if !result.valid => warn!("analysis skipped, sensor not ready"),
        Outcome::NotDetected => info!(
            frequency_hz = result.frequency,
            rms_g = result.rms_amplitude,
            band_power = result.spectrum.band_power,
            "no tremor"
        ),
    }
    Ok(())
}
