//! Live telemetry extraction and fan-out for F1 Manager 2024.
//!
//! The pipeline has two halves that usually run in separate processes:
//!
//! - **Export** (Windows only): attach to the game, walk a pointer chain to the
//!   car array and decode every tracked entity into a [`Snapshot`] roughly
//!   every 10 ms, publishing it into a shared memory region.
//! - **Relay** (any platform): map the region, poll it on a background thread
//!   and fan each snapshot into bounded queues drained by a change-gated CSV
//!   recorder and a UDP JSON feed.
//!
//! ```text
//! MemoryLayoutDecoder -> SnapshotWriter ==region==> SnapshotReader
//!     -> DistributionBroadcaster -> [recording queue] -> CsvSink
//!                                -> [broadcast queue] -> TelemetryBroadcastSink
//! ```
//!
//! No stage blocks on a slower one. A full queue drops the newest snapshot
//! for that consumer only.
//!
//! # Example (relay)
//!
//! ```rust,no_run
//! use f1m_telemetry::broadcaster::{delivery_queue, BroadcastOptions, DistributionBroadcaster, FanOut};
//! use f1m_telemetry::sinks::{spawn_sink, CsvSink};
//! use f1m_telemetry::source::ChannelSource;
//! use std::sync::{atomic::AtomicBool, Arc};
//! use std::time::Duration;
//!
//! fn main() -> f1m_telemetry::Result<()> {
//!     let (tx, rx) = delivery_queue(100);
//!     let source = ChannelSource::new("/tmp/F1Manager_Telemetry", Duration::from_secs(1), None);
//!     let mut broadcaster =
//!         DistributionBroadcaster::new(source, FanOut::new(Some(tx), None), BroadcastOptions::default());
//!     broadcaster.connect()?;
//!
//!     let running = Arc::new(AtomicBool::new(true));
//!     let csv = CsvSink::new("telemetry_data", &["MyTeam1".to_string()])?;
//!     let handle = spawn_sink(csv, rx, Duration::from_secs(1), running).expect("spawn");
//!     handle.join().expect("sink thread");
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod broadcaster;
pub mod channel;
pub mod config;
pub mod exporter;
pub mod layout;
pub mod memory;
pub mod sinks;
pub mod source;
pub mod types;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

pub use error::*;
pub use types::*;

pub use broadcaster::{BroadcasterState, DistributionBroadcaster, FanOut};
pub use channel::{SnapshotReader, SnapshotWriter};
pub use config::PipelineConfig;
pub use exporter::TelemetryExporter;
pub use layout::FieldLayout;
pub use memory::{MemoryLayoutDecoder, MemorySource};
pub use sinks::{CsvSink, SnapshotSink, TelemetryBroadcastSink};
pub use source::{ChannelSource, SnapshotSource};

#[cfg(windows)]
pub use windows::ProcessMemory;
