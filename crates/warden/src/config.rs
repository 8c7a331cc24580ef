//! Warden Configuration
//!
//! One TOML file, every section optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use warden_tun::PumpConfig;

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub device: DeviceConfig,
    pub pump: PumpConfig,
    pub blocklist: BlocklistConfig,
    pub reporting: ReportingConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            device: DeviceConfig::default(),
            pump: PumpConfig::default(),
            blocklist: BlocklistConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

/// Where the already-configured interface comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device node or FIFO to open
    pub path: Option<PathBuf>,
    /// Descriptor inherited from the process that created the interface
    pub fd: Option<i32>,
}

/// Initial blocked hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocklistConfig {
    pub domains: Vec<String>,
    /// Hosts-format or adblock-format list files, re-read on reload
    pub files: Vec<PathBuf>,
}

/// How visits are written out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One `info!` line per visit
    #[default]
    Log,
    /// One JSON object per line on stdout
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Visits buffered between the pump and the writer before new ones are dropped
    pub queue_capacity: usize,
    pub format: ReportFormat,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            format: ReportFormat::Log,
        }
    }
}

impl WardenConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pump.validate()?;
        match (&self.device.path, self.device.fd) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousDevice),
            (None, None) => return Err(ConfigError::NoDevice),
            (None, Some(fd)) if fd < 0 => return Err(ConfigError::InvalidFd(fd)),
            _ => {}
        }
        if self.reporting.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Pump(#[from] warden_tun::ConfigError),

    #[error("No interface configured (set device.path or device.fd)")]
    NoDevice,

    #[error("Both device.path and device.fd are set")]
    AmbiguousDevice,

    #[error("Invalid descriptor {0}")]
    InvalidFd(i32),

    #[error("Visit queue capacity must be at least 1")]
    ZeroQueueCapacity,
}
