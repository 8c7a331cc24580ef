//! Pump statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the worker thread
#[derive(Debug, Default)]
pub(crate) struct PumpCounters {
    pub frames_read: AtomicU64,
    pub bytes_read: AtomicU64,
    pub empty_reads: AtomicU64,
    pub forwarded: AtomicU64,
    pub dropped: AtomicU64,
    pub opaque: AtomicU64,
    pub hostnames: AtomicU64,
    pub dispatch_panics: AtomicU64,
    pub write_errors: AtomicU64,
}

impl PumpCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PumpStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PumpStats {
            frames_read: load(&self.frames_read),
            bytes_read: load(&self.bytes_read),
            empty_reads: load(&self.empty_reads),
            forwarded: load(&self.forwarded),
            dropped: load(&self.dropped),
            opaque: load(&self.opaque),
            hostnames: load(&self.hostnames),
            dispatch_panics: load(&self.dispatch_panics),
            write_errors: load(&self.write_errors),
        }
    }
}

/// Point-in-time copy of the pump counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Non-empty frames read from the device
    pub frames_read: u64,
    /// Bytes in those frames
    pub bytes_read: u64,
    /// Zero-length reads skipped
    pub empty_reads: u64,
    /// Frames written back to the device
    pub forwarded: u64,
    /// Frames discarded by policy
    pub dropped: u64,
    /// Frames no parser could read past the IP or transport header
    pub opaque: u64,
    /// Frames a hostname was recovered from
    pub hostnames: u64,
    /// Dispatches that panicked (frame was forwarded)
    pub dispatch_panics: u64,
    /// Failed writes
    pub write_errors: u64,
}

impl PumpStats {
    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "RX: {} frames ({:.2}MB), hostnames: {}, opaque: {}, forwarded: {}, dropped: {}, panics: {}, write errors: {}",
            self.frames_read,
            self.bytes_read as f64 / (1024.0 * 1024.0),
            self.hostnames,
            self.opaque,
            self.forwarded,
            self.dropped,
            self.dispatch_panics,
            self.write_errors
        )
    }
}
