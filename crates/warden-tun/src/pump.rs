//! Packet Pump
//!
//! The read → inspect → judge → write loop on a dedicated worker thread.
//!
//! # Lifecycle
//!
//! ```text
//!            start() ok
//!  Stopped ─────────────▶ Running
//!     ▲                     │
//!     └─────────────────────┘
//!      stop(), or the device closed
//! ```
//!
//! A frame is processed to completion before the next read. Dispatch runs
//! inside a panic isolation boundary: a panic is logged, counted, and the
//! frame is forwarded unchanged.

use crate::config::{ConfigError, PumpConfig};
use crate::device::{DeviceConnector, TunDevice, is_idle};
use crate::stats::{PumpCounters, PumpStats};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};
use warden_filter::{Inspection, PolicyEngine, Verdict, inspect};

/// Pump state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Not reading from any device
    Stopped,
    /// Worker is reading and dispatching frames
    Running,
}

impl PumpState {
    pub fn is_running(&self) -> bool {
        matches!(self, PumpState::Running)
    }
}

/// Pump errors
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error("Interface unavailable: {0}")]
    DeviceUnavailable(#[source] io::Error),

    #[error("Failed to spawn pump worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("Invalid pump configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Moves frames between the interface and the policy engine
pub struct PacketPump<C: DeviceConnector> {
    connector: C,
    engine: Arc<PolicyEngine>,
    config: PumpConfig,
    running: Arc<AtomicBool>,
    counters: Arc<PumpCounters>,
    worker: Option<JoinHandle<()>>,
}

impl<C: DeviceConnector> PacketPump<C> {
    /// Create a stopped pump
    pub fn new(connector: C, engine: Arc<PolicyEngine>, config: PumpConfig) -> Self {
        Self {
            connector,
            engine,
            config,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(PumpCounters::default()),
            worker: None,
        }
    }

    /// Current state
    pub fn state(&self) -> PumpState {
        if self.running.load(Ordering::Acquire) {
            PumpState::Running
        } else {
            PumpState::Stopped
        }
    }

    /// Get statistics
    pub fn stats(&self) -> PumpStats {
        self.counters.snapshot()
    }

    /// Acquire the device and start the worker.
    ///
    /// Starting a running pump is a no-op. Failure to acquire the device is
    /// returned here and never reaches the worker.
    pub fn start(&mut self) -> Result<(), PumpError> {
        if self.state().is_running() {
            debug!("Pump already running");
            return Ok(());
        }

        // Reap a worker that stopped on its own (device closed)
        self.join_worker();
        self.config.validate()?;

        let device = self.connector.connect().map_err(|e| {
            error!("Failed to acquire interface: {}", e);
            PumpError::DeviceUnavailable(e)
        })?;
        info!("Interface acquired, starting packet pump");

        self.running.store(true, Ordering::Release);

        let worker = Worker {
            engine: Arc::clone(&self.engine),
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
            buffer_size: self.config.buffer_size,
        };

        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                info!("Packet pump started");
                worker.run(device);
                info!("Packet pump stopped");
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(PumpError::Spawn(e))
            }
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Takes effect within one device poll interval.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.join_worker();
        if was_running {
            info!("Pump stopped: {}", self.stats().format());
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Packet pump worker panicked");
            }
        }
    }
}

impl<C: DeviceConnector> Drop for PacketPump<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the worker thread
struct Worker {
    engine: Arc<PolicyEngine>,
    running: Arc<AtomicBool>,
    counters: Arc<PumpCounters>,
    buffer_size: usize,
}

impl Worker {
    fn run<D: TunDevice>(&self, mut device: D) {
        let mut buf = vec![0u8; self.buffer_size];

        while self.running.load(Ordering::Acquire) {
            let len = match device.read_frame(&mut buf) {
                Ok(0) => {
                    PumpCounters::bump(&self.counters.empty_reads);
                    continue;
                }
                Ok(n) => n.min(buf.len()),
                Err(e) if is_idle(&e) => continue,
                Err(e) => {
                    warn!("Interface closed: {}", e);
                    break;
                }
            };

            self.process(&mut device, &buf[..len]);
        }

        self.running.store(false, Ordering::Release);
    }

    fn process<D: TunDevice>(&self, device: &mut D, frame: &[u8]) {
        PumpCounters::bump(&self.counters.frames_read);
        self.counters
            .bytes_read
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        let dispatch = || {
            let inspection = inspect(frame);
            match inspection {
                Inspection::Opaque => PumpCounters::bump(&self.counters.opaque),
                Inspection::Host { .. } => PumpCounters::bump(&self.counters.hostnames),
                Inspection::Unclassified { .. } | Inspection::TcpUnnamed { .. } => {}
            }
            self.engine.judge(&inspection)
        };

        let verdict = match panic::catch_unwind(AssertUnwindSafe(dispatch)) {
            Ok(verdict) => verdict,
            Err(panic_info) => {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("Dispatch panicked, forwarding frame: {}", message);
                PumpCounters::bump(&self.counters.dispatch_panics);
                Verdict::Forward
            }
        };

        match verdict {
            Verdict::Forward => match device.write_frame(frame) {
                Ok(()) => PumpCounters::bump(&self.counters.forwarded),
                Err(e) => {
                    warn!("Failed to write frame ({} bytes): {}", frame.len(), e);
                    PumpCounters::bump(&self.counters.write_errors);
                }
            },
            Verdict::Drop => {
                trace!("Dropped frame ({} bytes)", frame.len());
                PumpCounters::bump(&self.counters.dropped);
            }
        }
    }
}
