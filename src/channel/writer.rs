use super::envelope::{HEADER_LEN, max_payload, write_envelope};
use crate::types::Snapshot;
use crate::{Result, TelemetryError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Single writer side of the shared snapshot region.
///
/// Every publish overwrites the previous payload in place. There is no
/// sequence number or lock; readers get latest-value-wins semantics.
pub struct SnapshotWriter {
    path: PathBuf,
    mmap: MmapMut,
    published: u64,
    rejected: u64,
}

impl SnapshotWriter {
    /// Create or reuse the backing file, size it and map it.
    ///
    /// An existing file is never truncated, so readers still mapped from an
    /// earlier run keep a valid view. It only grows when smaller than `size`.
    /// The length prefix is cleared, leaving the region as "nothing
    /// published" until the first [`publish`](Self::publish).
    pub fn create(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if size <= HEADER_LEN {
            return Err(TelemetryError::Config {
                details: format!("region size {} cannot hold any payload", size),
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| TelemetryError::region_error(&path, e))?;

        let existing = file.metadata().map_err(|e| TelemetryError::region_error(&path, e))?.len();
        if existing < size as u64 {
            file.set_len(size as u64).map_err(|e| TelemetryError::region_error(&path, e))?;
        } else if existing > size as u64 {
            debug!(path = %path.display(), existing, size, "Reusing larger region file");
        }

        // SAFETY: this process is the only writer and the file never shrinks,
        // so the first `size` bytes stay backed for every mapping.
        let mut mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }
            .map_err(|e| TelemetryError::region_error(&path, e))?;

        mmap[..HEADER_LEN].fill(0);
        mmap.flush_range(0, HEADER_LEN).map_err(|e| TelemetryError::region_error(&path, e))?;

        info!(path = %path.display(), size, reused = existing > 0, "Shared region created");
        Ok(Self { path, mmap, published: 0, rejected: 0 })
    }

    /// Serialize and publish one snapshot. Returns the payload length.
    pub fn publish(&mut self, snapshot: &Snapshot) -> Result<usize> {
        let payload = serde_json::to_vec(snapshot).map_err(|source| TelemetryError::Serialization {
            context: "snapshot publish".to_string(),
            source,
        })?;
        self.publish_bytes(&payload)?;
        Ok(payload.len())
    }

    /// Publish an already serialized payload.
    pub fn publish_bytes(&mut self, payload: &[u8]) -> Result<()> {
        if let Err(e) = write_envelope(&mut self.mmap, payload) {
            self.rejected += 1;
            warn!(error = %e, rejected = self.rejected, "Snapshot not published");
            return Err(e);
        }

        self.mmap.flush_async().map_err(|e| TelemetryError::region_error(&self.path, e))?;
        self.published += 1;
        debug!(len = payload.len(), published = self.published, "Snapshot published");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        max_payload(self.mmap.len())
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Flush outstanding writes synchronously.
    pub fn close(&mut self) -> Result<()> {
        self.mmap.flush().map_err(|e| TelemetryError::region_error(&self.path, e))?;
        info!(path = %self.path.display(), published = self.published, "Shared region closed");
        Ok(())
    }
}
