//! Error types for telemetry extraction and distribution.
//!
//! Every fallible operation in the crate returns [`TelemetryError`]. Errors are
//! classified so loops can decide between backing off and giving up:
//!
//! - **Setup errors**: target process or module missing, pointer chain null,
//!   shared region unavailable
//! - **Transient errors**: a single memory read or snapshot read failing
//! - **Transport anomalies**: implausible envelope length or malformed payload
//! - **Sink errors**: file or socket I/O inside a consumer
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use f1m_telemetry::TelemetryError;
//!
//! let error = TelemetryError::connection_failed("F1Manager24.exe not running");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to attach to target: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Pointer chain resolved to null at hop {hop} (address {address:#x})")]
    PointerChain { hop: usize, address: u64 },

    #[error("Memory read failed at address {address:#x} ({len} bytes)")]
    Memory { address: u64, len: usize },

    #[error("Shared region error: {path}")]
    Region {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shared region {path} is no longer available")]
    RegionLost { path: PathBuf },

    #[error("Snapshot payload of {len} bytes exceeds region capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("Serialization failed in {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Field layout invalid: {reason}")]
    Layout { reason: String },

    #[error("Sink '{sink}' failed: {reason}")]
    Sink {
        sink: &'static str,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Connection { .. } => true,
            TelemetryError::PointerChain { .. } => true,
            TelemetryError::Memory { .. } => true,
            TelemetryError::Region { .. } => true,
            TelemetryError::RegionLost { .. } => false,
            TelemetryError::PayloadTooLarge { .. } => false,
            TelemetryError::Serialization { .. } => true,
            TelemetryError::Parse { .. } => true,
            TelemetryError::Layout { .. } => false,
            TelemetryError::Sink { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Config { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure F1 Manager 2024 is running",
                "Run the exporter with permission to read the game process",
                "Check the configured process name",
            ],
            TelemetryError::PointerChain { .. } => vec![
                "Load into a session so the car structures exist",
                "Verify the pointer chain matches the installed game build",
            ],
            TelemetryError::Memory { .. } => vec![
                "Check the field offset table against the game build",
                "Verify the target process is still alive",
            ],
            TelemetryError::Region { .. } => vec![
                "Check the shared region path is writable",
                "Ensure sufficient disk space for the backing file",
                "Start the exporter before the relay",
            ],
            TelemetryError::RegionLost { .. } => vec![
                "Restart the exporter to recreate the shared region",
                "Restart the relay once the region exists again",
            ],
            TelemetryError::PayloadTooLarge { .. } => vec![
                "Increase the configured region size",
                "Track fewer entities",
            ],
            TelemetryError::Serialization { .. } => vec![
                "Verify snapshot values are finite",
                "Check writer and reader run the same version",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            TelemetryError::Layout { .. } => vec![
                "Check every field kind matches its snapshot slot",
                "Verify enum tables are attached to byte or int32 fields only",
            ],
            TelemetryError::Sink { .. } => vec![
                "Check the output directory is writable",
                "Verify the UDP target address",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Check the producing side is running",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration file against the documented keys",
                "Remove the offending key to fall back to its default",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Run the exporter on Windows next to the game",
                "Use the relay on any platform once a region exists",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Run the exporter elevated if the game runs elevated",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for memory read errors.
    pub fn memory_access_error(address: u64, len: usize) -> Self {
        TelemetryError::Memory { address, len }
    }

    /// Helper constructor for shared region I/O errors.
    pub fn region_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TelemetryError::Region { path: path.into(), source }
    }

    /// Helper constructor for transport and format anomalies.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for sink failures.
    pub fn sink_error(
        sink: &'static str,
        reason: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TelemetryError::Sink { sink, reason: reason.into(), source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Serialization { context: "snapshot".to_string(), source: err }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
