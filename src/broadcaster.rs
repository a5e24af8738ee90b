//! Background fan-out of the latest snapshot into bounded delivery queues.
//!
//! The [`DistributionBroadcaster`] owns a [`SnapshotSource`] on a dedicated
//! thread. Every poll that yields a snapshot is offered to the recording queue
//! and, independently, to the broadcast queue. Offers never block: a full
//! queue drops the new snapshot for that consumer only.
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Running --close()--> Stopped
//!                                  |                 |
//!                                  +--err--> Disconnected
//!                                                    +--region lost--> Crashed
//! ```

use crate::source::SnapshotSource;
use crate::types::Snapshot;
use crate::{Result, TelemetryError};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

pub const RECORDING_QUEUE_CAPACITY: usize = 100;
pub const BROADCAST_QUEUE_CAPACITY: usize = 500;

/// Drops are logged on the first occurrence and then every this many.
const DROP_LOG_EVERY: u64 = 100;
const ERROR_LOG_EVERY: u64 = 50;

pub type SnapshotSender = Sender<Arc<Snapshot>>;
pub type SnapshotReceiver = Receiver<Arc<Snapshot>>;

/// Bounded single-producer single-consumer delivery queue.
pub fn delivery_queue(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    bounded(capacity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BroadcasterState {
    Disconnected = 0,
    Connecting = 1,
    Running = 2,
    Stopped = 3,
    Crashed = 4,
}

impl BroadcasterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BroadcasterState::Disconnected,
            1 => BroadcasterState::Connecting,
            2 => BroadcasterState::Running,
            3 => BroadcasterState::Stopped,
            _ => BroadcasterState::Crashed,
        }
    }
}

/// What happened to one snapshot on one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; the new snapshot was discarded.
    Dropped,
    /// Consumer hung up.
    Closed,
    /// No queue configured.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOutcome {
    pub recording: Delivery,
    pub broadcast: Delivery,
}

#[derive(Debug, Default)]
struct Counters {
    snapshots_read: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
    recording_queued: AtomicU64,
    recording_dropped: AtomicU64,
    broadcast_queued: AtomicU64,
    broadcast_dropped: AtomicU64,
}

/// Point-in-time copy of the broadcaster counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub snapshots_read: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
    pub recording_queued: u64,
    pub recording_dropped: u64,
    pub broadcast_queued: u64,
    pub broadcast_dropped: u64,
}

/// The two optional delivery queues fed by one producer.
pub struct FanOut {
    recording: Option<SnapshotSender>,
    broadcast: Option<SnapshotSender>,
    counters: Arc<Counters>,
}

impl FanOut {
    pub fn new(recording: Option<SnapshotSender>, broadcast: Option<SnapshotSender>) -> Self {
        Self { recording, broadcast, counters: Arc::default() }
    }

    /// Offer one snapshot to every configured queue without blocking.
    ///
    /// The broadcast queue is only attempted while it has free capacity.
    pub fn offer(&self, snapshot: Snapshot) -> OfferOutcome {
        let snapshot = Arc::new(snapshot);
        let counters = &self.counters;

        let recording = match &self.recording {
            Some(tx) => deliver(
                "recording",
                tx,
                &snapshot,
                &counters.recording_queued,
                &counters.recording_dropped,
            ),
            None => Delivery::Absent,
        };

        let broadcast = match &self.broadcast {
            Some(tx) if tx.is_full() => {
                note_drop("broadcast", &counters.broadcast_dropped);
                Delivery::Dropped
            }
            Some(tx) => deliver(
                "broadcast",
                tx,
                &snapshot,
                &counters.broadcast_queued,
                &counters.broadcast_dropped,
            ),
            None => Delivery::Absent,
        };

        OfferOutcome { recording, broadcast }
    }

    pub fn stats(&self) -> BroadcastStats {
        snapshot_counters(&self.counters)
    }
}

fn deliver(
    queue: &'static str,
    tx: &SnapshotSender,
    snapshot: &Arc<Snapshot>,
    queued: &AtomicU64,
    dropped: &AtomicU64,
) -> Delivery {
    match tx.try_send(Arc::clone(snapshot)) {
        Ok(()) => {
            queued.fetch_add(1, Ordering::Relaxed);
            Delivery::Queued
        }
        Err(TrySendError::Full(_)) => {
            note_drop(queue, dropped);
            Delivery::Dropped
        }
        Err(TrySendError::Disconnected(_)) => {
            trace!(queue, "Consumer disconnected");
            Delivery::Closed
        }
    }
}

fn note_drop(queue: &'static str, dropped: &AtomicU64) {
    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
    if total == 1 || total % DROP_LOG_EVERY == 0 {
        warn!(queue, dropped = total, "Queue full, snapshot dropped");
    }
}

fn snapshot_counters(counters: &Counters) -> BroadcastStats {
    BroadcastStats {
        snapshots_read: counters.snapshots_read.load(Ordering::Relaxed),
        empty_reads: counters.empty_reads.load(Ordering::Relaxed),
        read_errors: counters.read_errors.load(Ordering::Relaxed),
        recording_queued: counters.recording_queued.load(Ordering::Relaxed),
        recording_dropped: counters.recording_dropped.load(Ordering::Relaxed),
        broadcast_queued: counters.broadcast_queued.load(Ordering::Relaxed),
        broadcast_dropped: counters.broadcast_dropped.load(Ordering::Relaxed),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOptions {
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Sleep after a recoverable read error.
    pub error_backoff: Duration,
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(10), error_backoff: Duration::from_millis(100) }
    }
}

/// Polls a [`SnapshotSource`] on a background thread and fans snapshots out.
pub struct DistributionBroadcaster<S: SnapshotSource> {
    source: Option<S>,
    fan_out: Option<FanOut>,
    counters: Arc<Counters>,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    options: BroadcastOptions,
    handle: Option<JoinHandle<()>>,
}

impl<S: SnapshotSource> DistributionBroadcaster<S> {
    pub fn new(source: S, fan_out: FanOut, options: BroadcastOptions) -> Self {
        Self {
            source: Some(source),
            counters: Arc::clone(&fan_out.counters),
            fan_out: Some(fan_out),
            state: Arc::new(AtomicU8::new(BroadcasterState::Disconnected as u8)),
            stop: Arc::new(AtomicBool::new(false)),
            options,
            handle: None,
        }
    }

    /// Connect the source and start the background loop.
    ///
    /// On failure the broadcaster stays `Disconnected` and can be retried.
    pub fn connect(&mut self) -> Result<()> {
        if self.state() != BroadcasterState::Disconnected {
            return Err(TelemetryError::connection_failed(format!(
                "broadcaster cannot connect from state {:?}",
                self.state()
            )));
        }
        let (Some(mut source), Some(fan_out)) = (self.source.take(), self.fan_out.take()) else {
            return Err(TelemetryError::connection_failed("broadcaster already consumed"));
        };

        self.set_state(BroadcasterState::Connecting);
        info!("Broadcaster connecting");

        if let Err(e) = source.connect() {
            warn!(error = %e, "Broadcaster connect failed");
            self.source = Some(source);
            self.fan_out = Some(fan_out);
            self.set_state(BroadcasterState::Disconnected);
            return Err(e);
        }

        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop);
        let options = self.options;

        self.set_state(BroadcasterState::Running);
        let spawned = std::thread::Builder::new()
            .name("snapshot-broadcaster".into())
            .spawn(move || broadcast_loop(source, fan_out, state, stop, options));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("Broadcaster running");
                Ok(())
            }
            Err(e) => {
                self.set_state(BroadcasterState::Disconnected);
                Err(TelemetryError::connection_failed_with_source(
                    "failed to spawn broadcaster thread",
                    Box::new(e),
                ))
            }
        }
    }

    /// Stop the loop, join the thread and release the source. Idempotent.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Broadcaster thread panicked");
            }
        }
        self.source = None;
        self.fan_out = None;
        if self.state() != BroadcasterState::Stopped {
            self.set_state(BroadcasterState::Stopped);
            info!(stats = ?self.stats(), "Broadcaster stopped");
        }
    }

    pub fn state(&self) -> BroadcasterState {
        BroadcasterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> BroadcastStats {
        snapshot_counters(&self.counters)
    }

    fn set_state(&self, state: BroadcasterState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl<S: SnapshotSource> Drop for DistributionBroadcaster<S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn broadcast_loop<S: SnapshotSource>(
    mut source: S,
    fan_out: FanOut,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    options: BroadcastOptions,
) {
    info!("Broadcaster loop started");
    let counters = Arc::clone(&fan_out.counters);
    let mut consecutive_errors = 0u64;

    while !stop.load(Ordering::Acquire) {
        match source.read_latest() {
            Ok(Some(snapshot)) => {
                consecutive_errors = 0;
                let total = counters.snapshots_read.fetch_add(1, Ordering::Relaxed) + 1;
                let outcome = fan_out.offer(snapshot);
                trace!(total, ?outcome, "Snapshot distributed");
                std::thread::sleep(options.poll_interval);
            }
            Ok(None) => {
                counters.empty_reads.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(options.poll_interval);
            }
            Err(e) if e.is_retryable() => {
                consecutive_errors += 1;
                counters.read_errors.fetch_add(1, Ordering::Relaxed);
                if consecutive_errors == 1 || consecutive_errors % ERROR_LOG_EVERY == 0 {
                    warn!(error = %e, consecutive_errors, "Snapshot read failed");
                } else {
                    debug!(error = %e, consecutive_errors, "Snapshot read failed");
                }
                std::thread::sleep(options.error_backoff);
            }
            Err(e) => {
                error!(error = %e, "Snapshot source lost, broadcaster crashed");
                state.store(BroadcasterState::Crashed as u8, Ordering::Release);
                return;
            }
        }
    }

    info!(
        snapshots = counters.snapshots_read.load(Ordering::Relaxed),
        "Broadcaster loop ended"
    );
}
