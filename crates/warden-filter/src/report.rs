//! Visit reporting
//!
//! Every recovered hostname is reported once per packet, blocked or not.
//! Reporting must never stall the packet path, so the channel sink hands
//! visits off with `try_send` and counts what it had to drop.

use crate::inspect::HostSource;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// A hostname observed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visit {
    /// Normalized hostname
    pub host: String,
    /// Which protocol carried it
    pub source: HostSource,
    /// Whether the packet was dropped
    pub blocked: bool,
    /// Wall-clock time of observation (ms since the Unix epoch)
    pub timestamp_ms: u64,
}

impl Visit {
    pub fn new(host: impl Into<String>, source: HostSource, blocked: bool) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            host: host.into(),
            source,
            blocked,
            timestamp_ms,
        }
    }
}

/// Receives visit reports from the packet path.
///
/// Called on the pump thread for every hostname-bearing packet, so
/// implementations must return quickly and must not block.
pub trait VisitSink: Send + Sync {
    fn record_visit(&self, visit: &Visit);
}

impl<F> VisitSink for F
where
    F: Fn(&Visit) + Send + Sync,
{
    fn record_visit(&self, visit: &Visit) {
        self(visit)
    }
}

/// Sink that discards every visit
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisitSink for NullSink {
    fn record_visit(&self, _visit: &Visit) {}
}

/// Bounded, non-blocking hand-off to a consumer thread
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Visit>,
    dropped: AtomicU64,
}

/// Create a channel sink and the receiver its consumer drains
pub fn visit_channel(capacity: usize) -> (ChannelSink, Receiver<Visit>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        ChannelSink {
            tx,
            dropped: AtomicU64::new(0),
        },
        rx,
    )
}

impl ChannelSink {
    /// Visits discarded because the queue was full or the consumer was gone
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl VisitSink for ChannelSink {
    fn record_visit(&self, visit: &Visit) {
        match self.tx.try_send(visit.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Log the first drop and then every thousandth
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!("Visit queue full, {} visits dropped so far", dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
