use super::envelope::{HEADER_LEN, read_envelope};
use crate::types::Snapshot;
use crate::{Result, TelemetryError};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Read side of the shared snapshot region.
pub struct SnapshotReader {
    path: PathBuf,
    mmap: Mmap,
}

impl SnapshotReader {
    /// Map an existing region once.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| TelemetryError::region_error(&path, e))?;

        let len = file.metadata().map_err(|e| TelemetryError::region_error(&path, e))?.len();
        if len <= HEADER_LEN as u64 {
            return Err(TelemetryError::parse_error(
                "shared region",
                format!("{} is only {} bytes", path.display(), len),
            ));
        }

        // SAFETY: the mapping is read-only; concurrent writes by the exporter
        // are observed as torn payloads and rejected during parsing.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| TelemetryError::region_error(&path, e))?;

        info!(path = %path.display(), size = mmap.len(), "Shared region mapped");
        Ok(Self { path, mmap })
    }

    /// Wait for the region to appear, then map it.
    ///
    /// Missing or not yet sized regions are retried every `retry_interval`.
    /// Gives up with [`TelemetryError::Timeout`] once `timeout` elapses, if set.
    pub fn connect(
        path: impl AsRef<Path>,
        retry_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let started = Instant::now();
        let mut attempts = 0u64;

        loop {
            attempts += 1;
            match Self::open(path) {
                Ok(reader) => return Ok(reader),
                Err(e @ (TelemetryError::Region { .. } | TelemetryError::Parse { .. }))
                    if path_pending(path, &e) =>
                {
                    if attempts == 1 || attempts % 10 == 0 {
                        info!(path = %path.display(), attempts, "Waiting for shared region");
                    }
                    debug!(error = %e, "Shared region not ready");
                }
                Err(e) => return Err(e),
            }

            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    return Err(TelemetryError::Timeout { duration: timeout });
                }
            }
            std::thread::sleep(retry_interval);
        }
    }

    /// Copy out and decode the current payload.
    ///
    /// `Ok(None)` means nothing has been published yet. Implausible lengths
    /// and undecodable payloads (including torn reads) are parse errors.
    /// A vanished backing file is [`TelemetryError::RegionLost`].
    pub fn read_latest(&self) -> Result<Option<Snapshot>> {
        let Some(payload) = self.read_payload()? else {
            return Ok(None);
        };

        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| TelemetryError::parse_error("snapshot payload", e.to_string()))
    }

    /// Copy out the raw payload bytes.
    pub fn read_payload(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Err(TelemetryError::RegionLost { path: self.path.clone() });
        }
        Ok(read_envelope(&self.mmap)?.map(<[u8]>::to_vec))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether `error` means the region is still being created.
fn path_pending(path: &Path, error: &TelemetryError) -> bool {
    match error {
        TelemetryError::Region { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        TelemetryError::Parse { .. } => path.exists(),
        _ => false,
    }
}
