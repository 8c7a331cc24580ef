//! Pump Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest frame the interface hands us (IPv4 total length is 16 bits, the
/// interface MTU keeps real frames far below this)
pub const DEFAULT_BUFFER_SIZE: usize = 32767;

/// How long a device read may wait before the running flag is re-checked
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Packet pump settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Read buffer size; also bounds the work done per frame
    pub buffer_size: usize,
    /// Upper bound on how long `stop()` waits for the worker to notice
    pub poll_interval_ms: u64,
    /// Name of the worker thread
    pub thread_name: String,
}

impl PumpConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size < 20 {
            return Err(ConfigError::BufferTooSmall(self.buffer_size));
        }
        if self.buffer_size > usize::from(u16::MAX) {
            return Err(ConfigError::BufferTooLarge(self.buffer_size));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            thread_name: "warden-pump".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Buffer size {0} cannot hold an IPv4 header")]
    BufferTooSmall(usize),

    #[error("Buffer size {0} exceeds the largest IPv4 frame")]
    BufferTooLarge(usize),

    #[error("Poll interval must be at least 1 ms")]
    ZeroPollInterval,
}
