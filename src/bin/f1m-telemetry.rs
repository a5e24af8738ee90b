//! f1m-telemetry - export and relay F1 Manager 2024 telemetry.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use f1m_telemetry::broadcaster::{BroadcasterState, DistributionBroadcaster, FanOut, SnapshotReceiver, delivery_queue};
use f1m_telemetry::sinks::{CsvSink, SinkReport, TelemetryBroadcastSink, spawn_sink};
use f1m_telemetry::source::ChannelSource;
use f1m_telemetry::PipelineConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MONITOR_EVERY: Duration = Duration::from_secs(1);
const SUPERVISOR_TICK: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "f1m-telemetry")]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML pipeline configuration; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode the running game and publish snapshots into the shared region (Windows only)
    Export,
    /// Read the shared region and feed the enabled CSV and UDP sinks
    Relay,
    /// Print the effective configuration as YAML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let running = Arc::new(AtomicBool::new(true));
    watch_interrupt(Arc::clone(&running))?;

    match cli.command {
        Commands::Export => export(&config, &running),
        Commands::Relay => relay(&config, &running),
        Commands::Config => {
            print!("{}", serde_yaml_ng::to_string(&config)?);
            Ok(())
        }
    }
}

/// Clear `running` on the first Ctrl+C and exit on the second.
fn watch_interrupt(running: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl+C: {}", e);
                        return;
                    }
                    if running.swap(false, Ordering::AcqRel) {
                        info!("Interrupt received, shutting down");
                    } else {
                        warn!("Second interrupt, exiting immediately");
                        std::process::exit(130);
                    }
                }
            })
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}

#[cfg(windows)]
fn export(config: &PipelineConfig, running: &AtomicBool) -> Result<()> {
    use f1m_telemetry::{ProcessMemory, TelemetryExporter};

    let process = config.process_name.clone();
    let mut exporter = TelemetryExporter::initialize(
        || ProcessMemory::attach(&process),
        config.layout(),
        config.exporter_options(),
    )
    .context("exporter initialization failed")?;

    let report = exporter.run(running);
    exporter.close()?;
    let report = report?;
    info!(
        cycles = report.cycles,
        published = report.published,
        stale = report.stale,
        failed = report.failed,
        "Export finished"
    );
    Ok(())
}

#[cfg(not(windows))]
fn export(_config: &PipelineConfig, _running: &AtomicBool) -> Result<()> {
    Err(f1m_telemetry::TelemetryError::unsupported_platform("export", "Windows").into())
}

fn relay(config: &PipelineConfig, running: &Arc<AtomicBool>) -> Result<()> {
    let wait = config.sink_wait();
    let mut sinks: Vec<(&'static str, JoinHandle<SinkReport>)> = Vec::new();
    let mut levels: Vec<(&'static str, SnapshotReceiver, usize)> = Vec::new();

    let recording = if config.csv.enabled {
        let capacity = config.broadcaster.recording_capacity;
        let (tx, rx) = delivery_queue(capacity);
        let sink = CsvSink::new(&config.csv.dir, &config.csv.tracked)?;
        levels.push(("recording", rx.clone(), capacity));
        sinks.push(("csv", spawn_sink(sink, rx, wait, Arc::clone(running))?));
        Some(tx)
    } else {
        None
    };

    let broadcast = if config.udp.enabled {
        let capacity = config.broadcaster.broadcast_capacity;
        let (tx, rx) = delivery_queue(capacity);
        let sink = TelemetryBroadcastSink::new(config.udp.target)?;
        levels.push(("broadcast", rx.clone(), capacity));
        sinks.push(("udp", spawn_sink(sink, rx, wait, Arc::clone(running))?));
        Some(tx)
    } else {
        None
    };

    if sinks.is_empty() {
        warn!("No sink enabled; snapshots will only be counted");
    }

    let source = ChannelSource::new(config.region.path.clone(), config.connect_retry(), config.connect_timeout());
    let mut broadcaster =
        DistributionBroadcaster::new(source, FanOut::new(recording, broadcast), config.broadcast_options());

    let outcome = broadcaster.connect().context("broadcaster failed to connect");
    if outcome.is_ok() {
        supervise(&broadcaster, &levels, running);
    }

    let crashed = broadcaster.state() == BroadcasterState::Crashed;
    broadcaster.close();
    running.store(false, Ordering::Release);
    for (name, handle) in sinks {
        match handle.join() {
            Ok(report) => info!(sink = name, consumed = report.consumed, failed = report.failed, "Sink joined"),
            Err(_) => error!(sink = name, "Sink thread panicked"),
        }
    }

    outcome?;
    if crashed {
        anyhow::bail!("broadcaster crashed");
    }
    Ok(())
}

/// Watch the broadcaster and log queue fill levels until stop or crash.
fn supervise<S>(
    broadcaster: &DistributionBroadcaster<S>,
    levels: &[(&'static str, SnapshotReceiver, usize)],
    running: &AtomicBool,
) where
    S: f1m_telemetry::SnapshotSource,
{
    let mut last_report = Instant::now();
    while running.load(Ordering::Acquire) {
        if broadcaster.state() == BroadcasterState::Crashed {
            error!("Broadcaster crashed, stopping relay");
            break;
        }

        if last_report.elapsed() >= MONITOR_EVERY {
            last_report = Instant::now();
            for (queue, rx, capacity) in levels {
                info!(queue = *queue, len = rx.len(), capacity = *capacity, "Queue level");
            }
            let stats = broadcaster.stats();
            info!(
                read = stats.snapshots_read,
                errors = stats.read_errors,
                recording_dropped = stats.recording_dropped,
                broadcast_dropped = stats.broadcast_dropped,
                "Broadcaster stats"
            );
        }
        std::thread::sleep(SUPERVISOR_TICK);
    }
}
