//! Source abstraction the broadcaster pulls snapshots from.

use crate::channel::SnapshotReader;
use crate::types::Snapshot;
use crate::{Result, TelemetryError};
use std::path::PathBuf;
use std::time::Duration;

/// Something the broadcaster can connect to and poll for the latest snapshot.
///
/// `connect` runs on the caller's thread; `read_latest` runs on the
/// broadcaster's background thread.
pub trait SnapshotSource: Send + 'static {
    /// Block until the source is readable.
    fn connect(&mut self) -> Result<()>;

    /// Latest snapshot, or `None` when nothing has been published.
    fn read_latest(&mut self) -> Result<Option<Snapshot>>;
}

/// [`SnapshotSource`] over the shared snapshot region.
pub struct ChannelSource {
    path: PathBuf,
    retry_interval: Duration,
    timeout: Option<Duration>,
    reader: Option<SnapshotReader>,
}

impl ChannelSource {
    pub fn new(path: impl Into<PathBuf>, retry_interval: Duration, timeout: Option<Duration>) -> Self {
        Self { path: path.into(), retry_interval, timeout, reader: None }
    }
}

impl SnapshotSource for ChannelSource {
    fn connect(&mut self) -> Result<()> {
        self.reader = Some(SnapshotReader::connect(&self.path, self.retry_interval, self.timeout)?);
        Ok(())
    }

    fn read_latest(&mut self) -> Result<Option<Snapshot>> {
        self.reader
            .as_ref()
            .ok_or_else(|| TelemetryError::connection_failed("shared region not connected"))?
            .read_latest()
    }
}
