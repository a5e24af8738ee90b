//! Remote memory access and the layout-driven decoder.
//!
//! [`MemorySource`] is the seam between the decoder and a live process. The
//! Windows implementation reads another process with `ReadProcessMemory`;
//! tests and benches use an in-memory fake.

mod decoder;

pub use decoder::{MIN_VALID_ADDRESS, MemoryLayoutDecoder};

use crate::Result;

/// Read access to a foreign address space.
pub trait MemorySource: Send {
    /// Fill `buf` with the bytes at `address`. Partial reads are errors.
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Base address of a loaded module, by file name.
    fn module_base(&self, module: &str) -> Result<u64>;
}

impl<M: MemorySource + Sync> MemorySource for std::sync::Arc<M> {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(address, buf)
    }

    fn module_base(&self, module: &str) -> Result<u64> {
        (**self).module_base(module)
    }
}
