//! Process-lifetime pipeline counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the receiver, the dispatcher and the status reporter.
///
/// Each counter only ever grows. Reads are independent, so a snapshot may
/// mix values from slightly different moments.
#[derive(Debug, Default)]
pub struct Statistics {
    received: AtomicU64,
    sent: AtomicU64,
    send_errors: AtomicU64,
    dropped: AtomicU64,
}

/// Shareable statistics handle.
pub type SharedStatistics = Arc<Statistics>;

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub sent: u64,
    pub send_errors: u64,
    pub dropped: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source message arrived.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// A batch was accepted by the collector.
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A batch was given up on.
    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued batch was evicted to make room.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
