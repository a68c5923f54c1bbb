// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! ARMOUR - Covert Sensor Access Detection Engine
//!
//! Headless runner: drives the detection engine against a simulated sensor
//! feed, renders delivered notifications through the log, and optionally
//! records the feed for offline profiling. `--profile` runs the offline
//! minimum-rate pipeline against a recorded session and persists the
//! derived thresholds instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use armour::analysis;
use armour::detection::EventKind;
use armour::sensors::{SampleRecorder, SensorKind, SensorSimulator};
use armour::{Config, Engine, SharedConfig, VERSION};

/// ARMOUR - Covert Sensor Access Detection Engine
#[derive(Parser, Debug)]
#[command(name = "armour")]
#[command(author = "ARMOUR Project")]
#[command(version = VERSION)]
#[command(about = "Detects covert access to zero-permission motion sensors")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Stop after this many seconds (0 = run until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration_secs: u64,

    /// Emit delivered detection events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Record the sample feed as a profiling session with this name
    #[arg(long)]
    record: Option<String>,

    /// Compute minimum supported rates from a recorded profiling session
    /// (session name or directory), update thresholds, and exit
    #[arg(long)]
    profile: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("ARMOUR v{} - Covert Sensor Access Detection Engine", VERSION);

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_create(&config_path)?;

    if let Some(target) = args.profile.as_deref() {
        return run_profiling(config, &config_path, target);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_detection(config, args))
}

/// Offline path: reduce a recorded session to minimum supported rates and
/// persist the derived thresholds.
fn run_profiling(mut config: Config, config_path: &Path, target: &str) -> Result<()> {
    let session = {
        let as_path = PathBuf::from(target);
        if as_path.is_dir() {
            as_path
        } else {
            analysis::find_session_dir(&config.data_dir, target).ok_or_else(|| {
                anyhow!(
                    "no profiling session named '{}' under {:?}",
                    target,
                    config.data_dir
                )
            })?
        }
    };
    info!("Profiling session {:?}", session);

    let min_rates = analysis::min_supported_rates(&session)?;
    if min_rates.is_empty() {
        bail!("session {:?} contained no usable sensor logs", session);
    }

    config.thresholds.apply_min_rates(&min_rates);
    config.save(config_path)?;

    if config.thresholds.calibrated() {
        info!("All sensors calibrated");
    } else {
        warn!("Some sensors still lack profiling data; record a longer session");
    }
    Ok(())
}

async fn run_detection(config: Config, args: Args) -> Result<()> {
    let shared = SharedConfig::new(config);

    // The simulated feed needs thresholds to detect against; fill in any
    // the user has not calibrated, derived from the baseline rate. These
    // demo values are not persisted.
    {
        let mut config = shared.write();
        let base = config.simulator.base_rate_hz;
        let bias = config.thresholds.threshold_bias;
        for kind in SensorKind::ALL {
            if config.thresholds.threshold(kind).is_none() {
                config.thresholds.get_mut(kind).threshold_hz = Some(base + bias);
                info!("{}: using demo threshold {:.1} Hz", kind, base + bias);
            }
        }
    }

    let engine = Arc::new(Engine::new(shared.clone()));

    // Render delivered notifications. Grouped batches arrive back to back
    // once their window lapses; the log is the notification surface here.
    let mut events = engine.subscribe();
    let json = args.json;
    let notifier = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.kind {
                EventKind::UsageStarted => info!(
                    "{}: external usage detected ({:.1} Hz, threshold {:.1} Hz)",
                    event.sensor_name, event.instant_rate, event.threshold
                ),
                EventKind::UsageEnded => info!(
                    "{}: external usage ended ({:.1} Hz)",
                    event.sensor_name, event.instant_rate
                ),
            }
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(err) => warn!("Failed to serialize event: {}", err),
                }
            }
        }
    });

    let recorder = match args.record.as_deref() {
        Some(name) => {
            let data_dir = shared.read().data_dir.clone();
            Some(Arc::new(SampleRecorder::create(&data_dir, name)?))
        }
        None => None,
    };

    engine.start().await;

    // Simulated sensor subsystem: baseline slow delivery with periodic
    // covert-usage bursts.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let simulator = SensorSimulator::new(shared.read().simulator.clone());
    let feed_engine = Arc::clone(&engine);
    let feed_recorder = recorder.clone();
    let feed = simulator.spawn(
        move |kind, timestamp_ns| {
            feed_engine.on_sensor_timestamp(kind, timestamp_ns);
            if let Some(recorder) = &feed_recorder {
                if let Err(err) = recorder.record(kind, timestamp_ns, Utc::now().timestamp_millis())
                {
                    warn!("Failed to record sample: {}", err);
                }
            }
        },
        shutdown_rx,
    );

    info!("Detection running; press Ctrl+C to stop");
    if args.duration_secs > 0 {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = tokio::time::sleep(Duration::from_secs(args.duration_secs)) => {
                info!("Run duration elapsed");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = feed.await;
    engine.stop().await;
    if let Some(recorder) = &recorder {
        recorder.close()?;
        info!("Recorded session at {:?}", recorder.dir());
    }

    let status = engine.status();
    info!("Delivered {} detection events", status.events_delivered);
    notifier.abort();

    Ok(())
}
