//! Counters for bridge activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-bridge activity counters
#[derive(Debug)]
pub struct BridgeMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
    wait_time_ns: AtomicU64,
    start_time: Instant,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            wait_time_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed call and how long its caller was blocked
    pub fn record_completed(&self, waited: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.wait_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Record a call that never reached a worker
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a work item that panicked; it is not counted as completed
    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            wait_time_ns: self.wait_time_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
    pub panicked: u64,
    pub wait_time_ns: u64,
}

impl MetricsSnapshot {
    /// Calls submitted but not yet completed, rejected or panicked
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.rejected)
            .saturating_sub(self.panicked)
    }

    pub fn avg_wait(&self) -> Duration {
        if self.completed == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.wait_time_ns / self.completed)
    }
}
