//! Pipeline configuration loaded from YAML.
//!
//! Every section and key has a default, so an empty file is a valid config:
//!
//! ```yaml
//! process_name: F1Manager24.exe
//! csv:
//!   dir: telemetry_data
//!   tracked: [MyTeam1, MyTeam2]
//! udp:
//!   enabled: false
//! ```

use crate::broadcaster::{BROADCAST_QUEUE_CAPACITY, BroadcastOptions, RECORDING_QUEUE_CAPACITY};
use crate::channel::{DEFAULT_REGION_SIZE, HEADER_LEN, SHARED_REGION_NAME};
use crate::exporter::ExporterOptions;
use crate::layout::{FieldLayout, PointerChain};
use crate::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROCESS_NAME: &str = "F1Manager24.exe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub process_name: String,
    /// Replaces the built-in pointer chain when present.
    pub pointer_chain: Option<PointerChain>,
    pub region: RegionConfig,
    pub exporter: ExporterConfig,
    pub broadcaster: BroadcasterConfig,
    pub csv: CsvConfig,
    pub udp: UdpConfig,
    pub sink_wait_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            pointer_chain: None,
            region: RegionConfig::default(),
            exporter: ExporterConfig::default(),
            broadcaster: BroadcasterConfig::default(),
            csv: CsvConfig::default(),
            udp: UdpConfig::default(),
            sink_wait_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    pub path: PathBuf,
    pub size: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self { path: std::env::temp_dir().join(SHARED_REGION_NAME), size: DEFAULT_REGION_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    pub interval_ms: u64,
    pub attach_timeout_ms: u64,
    pub attach_retry_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self { interval_ms: 10, attach_timeout_ms: 60_000, attach_retry_ms: 1000, error_backoff_ms: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcasterConfig {
    pub poll_ms: u64,
    pub backoff_ms: u64,
    pub connect_retry_ms: u64,
    /// Wait forever for the region when absent.
    pub connect_timeout_ms: Option<u64>,
    pub recording_capacity: usize,
    pub broadcast_capacity: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            backoff_ms: 100,
            connect_retry_ms: 1000,
            connect_timeout_ms: None,
            recording_capacity: RECORDING_QUEUE_CAPACITY,
            broadcast_capacity: BROADCAST_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub tracked: Vec<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("telemetry_data"),
            tracked: vec!["MyTeam1".to_string(), "MyTeam2".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UdpConfig {
    pub enabled: bool,
    pub target: SocketAddr,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self { enabled: true, target: SocketAddr::from(([127, 0, 0, 1], 20777)) }
    }
}

impl PipelineConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TelemetryError::Config {
            details: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate YAML text. Empty text yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(text)
                .map_err(|e| TelemetryError::Config { details: e.to_string() })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("exporter.interval_ms", self.exporter.interval_ms),
            ("exporter.attach_retry_ms", self.exporter.attach_retry_ms),
            ("broadcaster.poll_ms", self.broadcaster.poll_ms),
            ("broadcaster.connect_retry_ms", self.broadcaster.connect_retry_ms),
            ("broadcaster.recording_capacity", self.broadcaster.recording_capacity as u64),
            ("broadcaster.broadcast_capacity", self.broadcaster.broadcast_capacity as u64),
            ("sink_wait_ms", self.sink_wait_ms),
        ];
        if let Some((key, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(config_error(format!("{} must be greater than zero", key)));
        }

        if self.region.size <= HEADER_LEN {
            return Err(config_error(format!(
                "region.size must exceed {} bytes, got {}",
                HEADER_LEN, self.region.size
            )));
        }
        if self.process_name.is_empty() {
            return Err(config_error("process_name is empty"));
        }

        let layout = self.layout();
        layout.validate()?;
        if let Some(unknown) = self.csv.tracked.iter().find(|id| layout.entity(id).is_none()) {
            return Err(config_error(format!("csv.tracked entity '{}' is not in the layout", unknown)));
        }
        Ok(())
    }

    /// Built-in layout with the configured pointer chain applied.
    pub fn layout(&self) -> FieldLayout {
        let layout = FieldLayout::f1_manager_2024();
        match &self.pointer_chain {
            Some(chain) => layout.with_chain(chain.clone()),
            None => layout,
        }
    }

    pub fn exporter_options(&self) -> ExporterOptions {
        ExporterOptions {
            region_path: self.region.path.clone(),
            region_size: self.region.size,
            interval: Duration::from_millis(self.exporter.interval_ms),
            attach_timeout: Duration::from_millis(self.exporter.attach_timeout_ms),
            attach_retry: Duration::from_millis(self.exporter.attach_retry_ms),
            error_backoff: Duration::from_millis(self.exporter.error_backoff_ms),
        }
    }

    pub fn broadcast_options(&self) -> BroadcastOptions {
        BroadcastOptions {
            poll_interval: Duration::from_millis(self.broadcaster.poll_ms),
            error_backoff: Duration::from_millis(self.broadcaster.backoff_ms),
        }
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.broadcaster.connect_retry_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.broadcaster.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn sink_wait(&self) -> Duration {
        Duration::from_millis(self.sink_wait_ms)
    }
}

fn config_error(details: impl Into<String>) -> TelemetryError {
    TelemetryError::Config { details: details.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = PipelineConfig::from_yaml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.region.size, 65_536);
        assert_eq!(config.broadcaster.recording_capacity, 100);
        assert_eq!(config.broadcaster.broadcast_capacity, 500);
        assert_eq!(config.sink_wait(), Duration::from_secs(1));
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_yaml(
            "csv:\n  tracked: [Ferrari1]\nudp:\n  target: 192.168.1.20:4739\n",
        )
        .unwrap();

        assert!(config.csv.enabled);
        assert_eq!(config.csv.tracked, vec!["Ferrari1".to_string()]);
        assert_eq!(config.csv.dir, PathBuf::from("telemetry_data"));
        assert_eq!(config.udp.target, "192.168.1.20:4739".parse().unwrap());
        assert_eq!(config.broadcaster.poll_ms, 10);
    }

    #[test]
    fn pointer_chain_override_reaches_layout() {
        let config = PipelineConfig::from_yaml(
            "pointer_chain:\n  module: F1Manager24.exe\n  offsets: [256, 8]\n",
        )
        .unwrap();

        let layout = config.layout();
        assert_eq!(layout.chain.offsets, vec![0x100, 0x8]);
        assert_eq!(layout.entities.len(), 22);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "broadcaster:\n  recording_capacity: 0\n",
            "exporter:\n  interval_ms: 0\n",
            "region:\n  size: 4\n",
            "csv:\n  tracked: [Nobody7]\n",
            "sink_wait_ms: 0\n",
            "unknown_key: 1\n",
            "udp:\n  target: not-an-address\n",
        ];
        for case in cases {
            let result = PipelineConfig::from_yaml(case);
            assert!(matches!(result, Err(TelemetryError::Config { .. })), "accepted: {case}");
        }
    }

    #[test]
    fn options_carry_configured_durations() {
        let config = PipelineConfig::from_yaml(
            "exporter:\n  interval_ms: 20\nbroadcaster:\n  backoff_ms: 250\n  connect_timeout_ms: 5000\n",
        )
        .unwrap();

        assert_eq!(config.exporter_options().interval, Duration::from_millis(20));
        assert_eq!(config.broadcast_options().error_backoff, Duration::from_millis(250));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "process_name: Other.exe\n").unwrap();

        assert_eq!(PipelineConfig::load(&path).unwrap().process_name, "Other.exe");
        assert!(PipelineConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
