//! Shared snapshot channel.
//!
//! One process publishes the latest [`Snapshot`](crate::Snapshot) into a
//! fixed-size file-backed memory region; any number of processes map the same
//! file and read it back. The region holds exactly one payload framed as
//! `[u32 LE length][UTF-8 JSON]` at offset 0.
//!
//! There is no locking between writer and readers. Readers copy the payload
//! out and validate it; a torn read surfaces as a parse error for that cycle.

mod envelope;
mod reader;
mod writer;

pub use envelope::{HEADER_LEN, max_payload, read_envelope, write_envelope};
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;

/// Default region name, also used as the backing file name.
pub const SHARED_REGION_NAME: &str = "F1Manager_Telemetry";

/// Default region size in bytes.
pub const DEFAULT_REGION_SIZE: usize = 64 * 1024;
