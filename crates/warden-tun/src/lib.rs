//! Warden TUN - Packet Pump over a Virtual Interface
//!
//! Runs the filter engine on the frames of an already-configured virtual
//! network interface.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  read_frame   ┌──────────────────────────┐
//! │              │──────────────▶│  Pump worker thread      │
//! │  TunDevice   │               │  inspect → PolicyEngine  │──▶ VisitSink
//! │              │◀──────────────│  Forward / Drop          │
//! └──────────────┘  write_frame  └──────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Fail open**: frames that cannot be parsed are forwarded unchanged
//! - **Never stalls**: visit reporting is a non-blocking hand-off
//! - **Bounded stop**: `stop()` returns within one poll interval

mod config;
mod device;
mod pump;
mod stats;

pub use config::{ConfigError, DEFAULT_BUFFER_SIZE, DEFAULT_POLL_INTERVAL_MS, PumpConfig};
#[cfg(unix)]
pub use device::FdDevice;
pub use device::{ChannelDevice, DeviceConnector, DeviceHandle, TunDevice, is_idle};
pub use pump::{PacketPump, PumpError, PumpState};
pub use stats::PumpStats;
