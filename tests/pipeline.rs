//! End-to-end relay path: region writer -> reader -> broadcaster -> sinks.

use f1m_telemetry::broadcaster::{
    BroadcastOptions, BroadcasterState, DistributionBroadcaster, FanOut, delivery_queue,
};
use f1m_telemetry::channel::{DEFAULT_REGION_SIZE, SnapshotWriter};
use f1m_telemetry::sinks::{CSV_HEADER, CsvSink, GARAGE_STATUS, TelemetryBroadcastSink, spawn_sink};
use f1m_telemetry::source::ChannelSource;
use f1m_telemetry::types::{EntitySnapshot, Resolved, Snapshot};
use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn entity(turn: i32, lap: i32, pit_status: &str) -> EntitySnapshot {
    let mut entity = EntitySnapshot::default();
    entity.resolved = Resolved { driver: true, session: true, weather: true };
    entity.session.track_name = "Monza".to_string();
    entity.driver.turn_number = turn;
    entity.driver.current_lap = lap;
    entity.driver.pitstop_status = pit_status.to_string();
    entity.car.tyre_compound = "Hard".to_string();
    entity
}

fn snapshot(turn: i32, lap: i32, pit_status: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert("MyTeam1", entity(turn, lap, pit_status));
    snapshot
}

fn row_count(path: &Path) -> usize {
    let mut reader = csv::Reader::from_path(path).unwrap();
    assert_eq!(reader.headers().unwrap().len(), CSV_HEADER.len());
    reader.records().count()
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn published_snapshots_reach_csv_and_udp() {
    let dir = tempfile::tempdir().unwrap();
    let region = dir.path().join("F1Manager_Telemetry");
    let mut writer = SnapshotWriter::create(&region, DEFAULT_REGION_SIZE).unwrap();

    let (rec_tx, rec_rx) = delivery_queue(100);
    let (udp_tx, udp_rx) = delivery_queue(500);

    let tracked = vec!["MyTeam1".to_string()];
    let csv = CsvSink::new(dir.path().join("telemetry_data"), &tracked).unwrap();
    let csv_path = csv.path("MyTeam1").unwrap().to_path_buf();

    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let udp = TelemetryBroadcastSink::new(listener.local_addr().unwrap()).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let wait = Duration::from_millis(20);
    let csv_handle = spawn_sink(csv, rec_rx, wait, Arc::clone(&running)).unwrap();
    let udp_handle = spawn_sink(udp, udp_rx, wait, Arc::clone(&running)).unwrap();

    let source = ChannelSource::new(&region, Duration::from_millis(10), Some(Duration::from_secs(2)));
    let options = BroadcastOptions {
        poll_interval: Duration::from_millis(2),
        error_backoff: Duration::from_millis(5),
    };
    let mut broadcaster =
        DistributionBroadcaster::new(source, FanOut::new(Some(rec_tx), Some(udp_tx)), options);
    broadcaster.connect().unwrap();
    assert_eq!(broadcaster.state(), BroadcasterState::Running);

    // Garage observations never become rows, however often they are polled.
    writer.publish(&snapshot(12, 3, GARAGE_STATUS)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || broadcaster.stats().snapshots_read >= 5));

    writer.publish(&snapshot(13, 3, "None")).unwrap();
    let mut buf = vec![0u8; 65_536];
    let json = loop {
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
        if json["cars"]["MyTeam1"]["turnNumber"] == 13 {
            break json;
        }
    };
    assert_eq!(json["session"]["trackName"], "Monza");
    assert_eq!(json["cars"]["MyTeam1"]["tyreCompound"], "Hard");

    assert!(wait_until(Duration::from_secs(2), || row_count(&csv_path) == 1));

    broadcaster.close();
    assert_eq!(broadcaster.state(), BroadcasterState::Stopped);
    running.store(false, Ordering::Release);

    let csv_report = csv_handle.join().unwrap();
    let udp_report = udp_handle.join().unwrap();
    assert_eq!(csv_report.failed, 0);
    assert_eq!(udp_report.failed, 0);

    // The latest snapshot was polled many times but is unchanged, so one row.
    assert_eq!(row_count(&csv_path), 1);
    writer.close().unwrap();
}

#[test]
fn relay_without_region_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let source = ChannelSource::new(
        dir.path().join("missing"),
        Duration::from_millis(5),
        Some(Duration::from_millis(30)),
    );
    let (tx, _rx) = delivery_queue(1);
    let mut broadcaster =
        DistributionBroadcaster::new(source, FanOut::new(Some(tx), None), BroadcastOptions::default());

    assert!(broadcaster.connect().is_err());
    assert_eq!(broadcaster.state(), BroadcasterState::Disconnected);
}
