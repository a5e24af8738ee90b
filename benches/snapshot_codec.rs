//! Benchmarks for the shared snapshot channel
//!
//! Covers the per-cycle cost on both sides of the region:
//! - Publishing a full 22-car snapshot (serialize + envelope write)
//! - Reading it back (envelope read + parse)
//!
//! Platform: Cross-platform (file-backed region in a temp dir)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use f1m_telemetry::channel::{DEFAULT_REGION_SIZE, SnapshotReader, SnapshotWriter};
use f1m_telemetry::layout::FieldLayout;
use f1m_telemetry::test_utils::sample_snapshot;
use std::hint::black_box;

fn full_grid() -> f1m_telemetry::Snapshot {
    let layout = FieldLayout::f1_manager_2024();
    let ids: Vec<&str> = layout.entities.iter().map(|slot| slot.id.as_str()).collect();
    sample_snapshot(&ids, 7, 12, "None")
}

fn bench_publish(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut writer =
        SnapshotWriter::create(dir.path().join("region"), DEFAULT_REGION_SIZE).expect("region");
    let snapshot = full_grid();
    let len = serde_json::to_vec(&snapshot).expect("serialize").len();

    let mut group = c.benchmark_group("snapshot_publish");
    group.throughput(Throughput::Bytes(len as u64));
    group.bench_function("full_grid", |b| {
        b.iter(|| black_box(writer.publish(black_box(&snapshot)).expect("publish")))
    });
    group.finish();
}

fn bench_read_latest(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("region");
    let mut writer = SnapshotWriter::create(&path, DEFAULT_REGION_SIZE).expect("region");
    let len = writer.publish(&full_grid()).expect("publish");
    let reader = SnapshotReader::open(&path).expect("open");

    let mut group = c.benchmark_group("snapshot_read");
    group.throughput(Throughput::Bytes(len as u64));
    group.bench_function("full_grid", |b| {
        b.iter(|| black_box(reader.read_latest().expect("read")))
    });
    group.bench_function("payload_only", |b| {
        b.iter(|| black_box(reader.read_payload().expect("read")))
    });
    group.finish();
}

criterion_group!(benches, bench_publish, bench_read_latest);
criterion_main!(benches);
