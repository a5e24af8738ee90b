//! Live process access on Windows.
//!
//! [`ProcessMemory`] locates the game by executable name, opens it for
//! reading and implements [`MemorySource`](crate::memory::MemorySource) on
//! top of `ReadProcessMemory`. Nothing here writes to the target.
//!
//! # Usage
//!
//! ```rust,ignore
//! use f1m_telemetry::windows::ProcessMemory;
//! use f1m_telemetry::{FieldLayout, MemoryLayoutDecoder};
//!
//! let process = ProcessMemory::attach("F1Manager24.exe")?;
//! let mut decoder = MemoryLayoutDecoder::new(process, FieldLayout::f1_manager_2024())?;
//! decoder.initialize()?;
//! let snapshot = decoder.decode_all();
//! ```

mod process;

pub use process::ProcessMemory;
