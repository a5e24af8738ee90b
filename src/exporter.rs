//! Writer side of the pipeline: decode the game process and publish snapshots.

use crate::channel::SnapshotWriter;
use crate::layout::FieldLayout;
use crate::memory::{MemoryLayoutDecoder, MemorySource};
use crate::{Result, TelemetryError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Consecutive failed cycles before the pointer chain is walked again.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterOptions {
    pub region_path: PathBuf,
    pub region_size: usize,
    /// Target time between cycle starts.
    pub interval: Duration,
    /// How long `initialize` waits for the process to appear.
    pub attach_timeout: Duration,
    pub attach_retry: Duration,
    /// Sleep after a failed cycle.
    pub error_backoff: Duration,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            region_path: std::env::temp_dir().join(crate::channel::SHARED_REGION_NAME),
            region_size: crate::channel::DEFAULT_REGION_SIZE,
            interval: Duration::from_millis(10),
            attach_timeout: Duration::from_secs(60),
            attach_retry: Duration::from_secs(1),
            error_backoff: Duration::from_millis(100),
        }
    }
}

/// Totals for one [`TelemetryExporter::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub cycles: u64,
    /// Cycles that published at least one complete entity.
    pub published: u64,
    /// Cycles where no entity resolved. The snapshot is still published.
    pub stale: u64,
    pub failed: u64,
    pub reinitialized: u64,
}

/// Outcome of one [`TelemetryExporter::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Payload length written to the region.
    pub len: usize,
    pub entities: usize,
    pub complete: usize,
}

impl CycleReport {
    /// No entity resolved, so the base address is likely stale.
    pub fn is_stale(&self) -> bool {
        self.complete == 0
    }
}

/// Owns the decoder and the region writer.
pub struct TelemetryExporter<M> {
    decoder: MemoryLayoutDecoder<M>,
    writer: SnapshotWriter,
    options: ExporterOptions,
}

impl<M: MemorySource> TelemetryExporter<M> {
    /// Attach, resolve the pointer chain and create the shared region.
    ///
    /// `attach` is retried every `attach_retry` while it fails with a
    /// retryable error, up to `attach_timeout`. A failure at any later step
    /// aborts without creating the region.
    pub fn initialize<F>(mut attach: F, layout: FieldLayout, options: ExporterOptions) -> Result<Self>
    where
        F: FnMut() -> Result<M>,
    {
        let source = wait_for_attach(&mut attach, options.attach_retry, options.attach_timeout)?;
        let mut decoder = MemoryLayoutDecoder::new(source, layout)?;
        decoder.initialize()?;

        let writer = SnapshotWriter::create(&options.region_path, options.region_size)?;
        info!(
            region = %options.region_path.display(),
            entities = decoder.layout().entities.len(),
            interval_ms = options.interval.as_millis() as u64,
            "Exporter initialized"
        );
        Ok(Self { decoder, writer, options })
    }

    /// Decode every entity and publish the result.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let snapshot = self.decoder.decode_all();
        let complete = snapshot.iter().filter(|(_, e)| e.is_complete()).count();
        let len = self.writer.publish(&snapshot)?;
        trace!(entities = snapshot.len(), complete, len, "Cycle published");
        Ok(CycleReport { len, entities: snapshot.len(), complete })
    }

    /// Cycle at the configured cadence until `running` clears.
    ///
    /// Failed cycles back off. A cycle where no entity resolves counts
    /// toward the same streak, and after `MAX_CONSECUTIVE_ERRORS` of either
    /// the pointer chain is walked again. Returns early only on a fatal error.
    pub fn run(&mut self, running: &AtomicBool) -> Result<ExportReport> {
        let mut report = ExportReport::default();
        let mut consecutive_errors = 0u32;
        info!("Exporter loop started");

        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            report.cycles += 1;

            match self.run_cycle() {
                Ok(cycle) if cycle.is_stale() => {
                    report.stale += 1;
                    consecutive_errors += 1;
                    debug!(entities = cycle.entities, consecutive_errors, "No entity resolved");
                    self.backoff(&mut consecutive_errors, &mut report);
                    continue;
                }
                Ok(_) => {
                    report.published += 1;
                    consecutive_errors = 0;
                }
                Err(e @ TelemetryError::PayloadTooLarge { .. }) => {
                    report.failed += 1;
                    debug!(error = %e, "Cycle skipped");
                }
                Err(e) if e.is_retryable() => {
                    report.failed += 1;
                    consecutive_errors += 1;
                    warn!(error = %e, consecutive_errors, "Cycle failed");
                    self.backoff(&mut consecutive_errors, &mut report);
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Exporter stopping on fatal error");
                    return Err(e);
                }
            }

            if let Some(rest) = self.options.interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        info!(
            cycles = report.cycles,
            published = report.published,
            stale = report.stale,
            failed = report.failed,
            reinitialized = report.reinitialized,
            "Exporter loop stopped"
        );
        Ok(report)
    }

    fn backoff(&mut self, consecutive_errors: &mut u32, report: &mut ExportReport) {
        if *consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            *consecutive_errors = 0;
            report.reinitialized += 1;
            if let Err(e) = self.decoder.initialize() {
                warn!(error = %e, "Pointer chain not resolved again");
            }
        }
        std::thread::sleep(self.options.error_backoff);
    }

    pub fn decoder(&self) -> &MemoryLayoutDecoder<M> {
        &self.decoder
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Flush the region. The backing file stays for readers to observe.
    pub fn close(&mut self) -> Result<()> {
        self.writer.close()
    }
}

fn wait_for_attach<M, F>(attach: &mut F, retry: Duration, timeout: Duration) -> Result<M>
where
    F: FnMut() -> Result<M>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match attach() {
            Ok(source) => {
                if attempts > 1 {
                    info!(attempts, "Attached to target process");
                }
                return Ok(source);
            }
            Err(e) if e.is_retryable() && Instant::now() < deadline => {
                if attempts == 1 {
                    info!(error = %e, "Waiting for target process");
                } else {
                    debug!(attempts, error = %e, "Target process not ready");
                }
                std::thread::sleep(retry);
            }
            Err(e) if e.is_retryable() => {
                warn!(attempts, error = %e, "Gave up waiting for target process");
                return Err(TelemetryError::Timeout { duration: timeout });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SnapshotReader;
    use crate::test_utils::FakeMemory;
    use std::sync::Arc;

    fn options(dir: &tempfile::TempDir) -> ExporterOptions {
        ExporterOptions {
            region_path: dir.path().join("region"),
            attach_timeout: Duration::from_millis(200),
            attach_retry: Duration::from_millis(5),
            error_backoff: Duration::from_millis(1),
            interval: Duration::from_millis(1),
            ..ExporterOptions::default()
        }
    }

    fn populated() -> Arc<FakeMemory> {
        Arc::new(FakeMemory::populated(&FieldLayout::f1_manager_2024()))
    }

    #[test]
    fn cycle_publishes_every_entity() {
        let dir = tempfile::tempdir().unwrap();
        let memory = populated();
        let mut exporter = TelemetryExporter::initialize(
            || Ok(Arc::clone(&memory)),
            FieldLayout::f1_manager_2024(),
            options(&dir),
        )
        .unwrap();

        let cycle = exporter.run_cycle().unwrap();
        assert!(cycle.len > 0 && cycle.len <= exporter.writer().capacity());
        assert_eq!((cycle.entities, cycle.complete), (22, 22));
        assert!(!cycle.is_stale());

        let reader = SnapshotReader::open(dir.path().join("region")).unwrap();
        let snapshot = reader.read_latest().unwrap().unwrap();
        assert_eq!(snapshot.len(), 22);
        assert!(snapshot.iter().all(|(_, e)| e.is_complete()));
        assert_eq!(snapshot.get("Ferrari1").unwrap().weather.weather, "Sunny");
    }

    #[test]
    fn attach_is_retried_until_ready() {
        let dir = tempfile::tempdir().unwrap();
        let memory = populated();
        let mut attempts = 0;
        let exporter = TelemetryExporter::initialize(
            || {
                attempts += 1;
                if attempts < 3 {
                    Err(TelemetryError::connection_failed("F1Manager24.exe not running"))
                } else {
                    Ok(Arc::clone(&memory))
                }
            },
            FieldLayout::f1_manager_2024(),
            options(&dir),
        );

        assert!(exporter.is_ok());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn attach_times_out_without_region() {
        let dir = tempfile::tempdir().unwrap();
        let result = TelemetryExporter::<Arc<FakeMemory>>::initialize(
            || Err(TelemetryError::connection_failed("F1Manager24.exe not running")),
            FieldLayout::f1_manager_2024(),
            options(&dir),
        );

        assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
        assert!(!dir.path().join("region").exists());
    }

    #[test]
    fn null_chain_fails_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(FakeMemory::new());
        let layout = FieldLayout::f1_manager_2024();
        memory.add_module(&layout.chain.module, 0x1_4000_0000);
        memory.write_u64(0x1_4000_0000 + layout.chain.offsets[0], 0);

        let result = TelemetryExporter::initialize(|| Ok(Arc::clone(&memory)), layout, options(&dir));

        assert!(matches!(result, Err(TelemetryError::PointerChain { hop: 0, .. })));
        assert!(!dir.path().join("region").exists());
    }

    #[test]
    fn run_stops_when_flag_clears() {
        let dir = tempfile::tempdir().unwrap();
        let memory = populated();
        let mut exporter = TelemetryExporter::initialize(
            || Ok(Arc::clone(&memory)),
            FieldLayout::f1_manager_2024(),
            options(&dir),
        )
        .unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let stopper = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::Release);
            })
        };

        let report = exporter.run(&running).unwrap();
        stopper.join().unwrap();
        exporter.close().unwrap();

        assert!(report.published > 0);
        assert_eq!(report.failed, 0);
        assert_eq!(exporter.writer().published(), report.published);
    }

    #[test]
    fn oversized_cycles_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let memory = populated();
        let mut exporter = TelemetryExporter::initialize(
            || Ok(Arc::clone(&memory)),
            FieldLayout::f1_manager_2024(),
            ExporterOptions { region_size: 256, ..options(&dir) },
        )
        .unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let stopper = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                running.store(false, Ordering::Release);
            })
        };

        let report = exporter.run(&running).unwrap();
        stopper.join().unwrap();

        assert_eq!(report.published, 0);
        assert!(report.failed > 0);
        assert_eq!(report.reinitialized, 0);
    }

    #[test]
    fn unresolved_entities_trigger_chain_rewalk() {
        let dir = tempfile::tempdir().unwrap();
        let memory = populated();
        let layout = FieldLayout::f1_manager_2024();
        let mut exporter =
            TelemetryExporter::initialize(|| Ok(Arc::clone(&memory)), layout.clone(), options(&dir))
                .unwrap();

        // The game dropped its driver structures, as after a session reload.
        let base = exporter.decoder().base().unwrap();
        for slot in &layout.entities {
            memory.write_u64(base + slot.offset + layout.pointers.driver, 0);
        }

        let cycle = exporter.run_cycle().unwrap();
        assert!(cycle.is_stale());
        assert_eq!(cycle.entities, 22);

        let running = Arc::new(AtomicBool::new(true));
        let stopper = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                running.store(false, Ordering::Release);
            })
        };

        let report = exporter.run(&running).unwrap();
        stopper.join().unwrap();

        assert_eq!(report.published, 0);
        assert!(report.stale >= u64::from(MAX_CONSECUTIVE_ERRORS));
        assert!(report.reinitialized > 0);
        assert!(exporter.decoder().base().is_some());
    }
}
