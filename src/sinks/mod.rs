//! Consumers draining one delivery queue each.
//!
//! A sink only sees whole snapshots. Waiting on the queue is bounded; an
//! expired wait simply starts another poll. Errors from a single
//! [`consume`](SnapshotSink::consume) call are logged and never end the loop.

mod csv;
mod udp;

pub use self::csv::{CSV_HEADER, CsvSink, GARAGE_STATUS};
pub use self::udp::{CarPayload, SessionPayload, TelemetryBroadcastSink, TelemetryPayload, build_payload};

use crate::Result;
use crate::broadcaster::SnapshotReceiver;
use crate::types::Snapshot;
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Default bounded wait on a delivery queue.
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(1);

/// A consumer with its own filtering and serialization policy.
pub trait SnapshotSink: Send {
    fn name(&self) -> &'static str;

    /// Handle one snapshot.
    fn consume(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Release files and sockets. Must be idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Totals for one drain loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub consumed: u64,
    pub failed: u64,
    pub idle_waits: u64,
}

/// Drain `queue` into `sink` until `running` clears or the producer hangs up.
///
/// Snapshots still queued at shutdown are consumed before the sink closes.
pub fn drain<K: SnapshotSink + ?Sized>(
    sink: &mut K,
    queue: &SnapshotReceiver,
    wait: Duration,
    running: &AtomicBool,
) -> SinkReport {
    let name = sink.name();
    let mut report = SinkReport::default();
    info!(sink = name, "Sink started");

    while running.load(Ordering::Acquire) {
        match queue.recv_timeout(wait) {
            Ok(snapshot) => consume_one(sink, &snapshot, &mut report),
            Err(RecvTimeoutError::Timeout) => {
                report.idle_waits += 1;
                trace!(sink = name, "No snapshot within wait");
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!(sink = name, "Producer disconnected");
                break;
            }
        }
    }

    for snapshot in queue.try_iter() {
        consume_one(sink, &snapshot, &mut report);
    }

    if let Err(e) = sink.close() {
        error!(sink = name, error = %e, "Sink close failed");
    }
    info!(sink = name, consumed = report.consumed, failed = report.failed, "Sink stopped");
    report
}

fn consume_one<K: SnapshotSink + ?Sized>(sink: &mut K, snapshot: &Snapshot, report: &mut SinkReport) {
    match sink.consume(snapshot) {
        Ok(()) => report.consumed += 1,
        Err(e) => {
            report.failed += 1;
            warn!(sink = sink.name(), error = %e, failed = report.failed, "Snapshot not handled");
        }
    }
}

/// Run [`drain`] on a dedicated named thread.
pub fn spawn_sink<K>(
    mut sink: K,
    queue: SnapshotReceiver,
    wait: Duration,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<SinkReport>>
where
    K: SnapshotSink + 'static,
{
    std::thread::Builder::new()
        .name(format!("{}-sink", sink.name()))
        .spawn(move || drain(&mut sink, &queue, wait, &running))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryError;
    use crate::broadcaster::delivery_queue;
    use crate::test_utils::sample_snapshot;

    #[derive(Default)]
    struct Recorder {
        turns: Vec<i32>,
        fail_on: Option<i32>,
        closes: u32,
    }

    impl SnapshotSink for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn consume(&mut self, snapshot: &Snapshot) -> Result<()> {
            let turn = snapshot.get("MyTeam1").map(|e| e.driver.turn_number).unwrap_or(-1);
            if self.fail_on == Some(turn) {
                return Err(TelemetryError::sink_error("recorder", "disk full", None));
            }
            self.turns.push(turn);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn drain_continues_past_failures_and_closes() {
        let (tx, rx) = delivery_queue(8);
        for turn in 1..=4 {
            tx.send(Arc::new(sample_snapshot(&["MyTeam1"], turn, 1, "None"))).unwrap();
        }
        drop(tx);

        let mut sink = Recorder { fail_on: Some(2), ..Recorder::default() };
        let running = AtomicBool::new(true);
        let report = drain(&mut sink, &rx, Duration::from_millis(10), &running);

        assert_eq!(sink.turns, vec![1, 3, 4]);
        assert_eq!(report.consumed, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(sink.closes, 1);
    }

    #[test]
    fn stopped_drain_still_consumes_backlog() {
        let (tx, rx) = delivery_queue(8);
        tx.send(Arc::new(sample_snapshot(&["MyTeam1"], 9, 1, "None"))).unwrap();

        let mut sink = Recorder::default();
        let running = AtomicBool::new(false);
        let report = drain(&mut sink, &rx, Duration::from_millis(10), &running);

        assert_eq!(sink.turns, vec![9]);
        assert_eq!(report.consumed, 1);
        drop(tx);
    }

    #[test]
    fn idle_waits_are_not_errors() {
        let (tx, rx) = delivery_queue(1);
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_sink(Recorder::default(), rx, Duration::from_millis(5), Arc::clone(&running)).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        running.store(false, Ordering::Release);
        let report = handle.join().unwrap();

        assert!(report.idle_waits > 0);
        assert_eq!(report.failed, 0);
        drop(tx);
    }
}
