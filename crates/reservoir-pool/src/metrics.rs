//! Pool metrics
//!
//! Counters are independent relaxed atomics: callers on hot paths pay one
//! uncontended `fetch_add`, and a snapshot is not a consistent cut across
//! counters. When metrics are disabled every recorder returns immediately
//! and the cumulative values stay at zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Accumulates total, max and count for one timed operation
#[derive(Debug, Default)]
struct Timing {
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    count: AtomicU64,
}

impl Timing {
    fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    fn max(&self) -> Duration {
        Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed))
    }

    fn average(&self) -> Duration {
        match self.count.load(Ordering::Relaxed) {
            0 => Duration::ZERO,
            count => Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed) / count),
        }
    }

    fn reset(&self) {
        self.total_nanos.store(0, Ordering::Relaxed);
        self.max_nanos.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Live counters owned by a pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    enabled: bool,
    creation_count: AtomicU64,
    destruction_count: AtomicU64,
    acquire_count: AtomicU64,
    timeout_count: AtomicU64,
    leak_detection_count: AtomicU64,
    invalid_count: AtomicU64,
    reap_count: AtomicU64,
    flush_count: AtomicU64,
    max_used_count: AtomicU64,
    creation_time: Timing,
    acquire_time: Timing,
}

impl PoolMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn record_creation(&self, elapsed: Duration) {
        if self.enabled {
            self.creation_count.fetch_add(1, Ordering::Relaxed);
            self.creation_time.record(elapsed);
        }
    }

    pub(crate) fn record_destruction(&self) {
        self.bump(&self.destruction_count);
    }

    pub(crate) fn record_acquire(&self, elapsed: Duration) {
        if self.enabled {
            self.acquire_count.fetch_add(1, Ordering::Relaxed);
            self.acquire_time.record(elapsed);
        }
    }

    pub(crate) fn record_timeout(&self) {
        self.bump(&self.timeout_count);
    }

    pub(crate) fn record_leak(&self) {
        self.bump(&self.leak_detection_count);
    }

    pub(crate) fn record_invalid(&self) {
        self.bump(&self.invalid_count);
    }

    pub(crate) fn record_reap(&self) {
        self.bump(&self.reap_count);
    }

    pub(crate) fn record_flush(&self) {
        self.bump(&self.flush_count);
    }

    /// Raise the high-water mark of simultaneously checked-out connections
    pub(crate) fn record_in_use(&self, in_use: usize) {
        if self.enabled {
            self.max_used_count
                .fetch_max(in_use as u64, Ordering::Relaxed);
        }
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.enabled {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Zero all cumulative counters
    pub fn reset(&self) {
        for counter in [
            &self.creation_count,
            &self.destruction_count,
            &self.acquire_count,
            &self.timeout_count,
            &self.leak_detection_count,
            &self.invalid_count,
            &self.reap_count,
            &self.flush_count,
            &self.max_used_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.creation_time.reset();
        self.acquire_time.reset();
    }

    /// Combine the counters with the current pool gauges
    pub(crate) fn snapshot(&self, active: usize, idle: usize, awaiting: usize) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            creation_count: load(&self.creation_count),
            destruction_count: load(&self.destruction_count),
            acquire_count: load(&self.acquire_count),
            timeout_count: load(&self.timeout_count),
            leak_detection_count: load(&self.leak_detection_count),
            invalid_count: load(&self.invalid_count),
            reap_count: load(&self.reap_count),
            flush_count: load(&self.flush_count),
            max_used_count: load(&self.max_used_count),
            active_count: active,
            idle_count: idle,
            awaiting_count: awaiting,
            creation_time_avg: self.creation_time.average(),
            creation_time_max: self.creation_time.max(),
            creation_time_total: self.creation_time.total(),
            acquire_time_avg: self.acquire_time.average(),
            acquire_time_max: self.acquire_time.max(),
            acquire_time_total: self.acquire_time.total(),
        }
    }
}

/// Read-only view of a pool's metrics at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections created by the factory
    pub creation_count: u64,
    /// Connections physically closed by the pool
    pub destruction_count: u64,
    /// Successful acquisitions
    pub acquire_count: u64,
    /// Acquisitions that ran out of time
    pub timeout_count: u64,
    /// Checkouts held past the leak timeout
    pub leak_detection_count: u64,
    /// Connections discarded as invalid or fatally failed
    pub invalid_count: u64,
    /// Idle connections closed by the reaper
    pub reap_count: u64,
    pub flush_count: u64,
    /// Most connections checked out at once
    pub max_used_count: u64,
    pub active_count: usize,
    pub idle_count: usize,
    /// Callers currently waiting in acquire
    pub awaiting_count: usize,
    pub creation_time_avg: Duration,
    pub creation_time_max: Duration,
    pub creation_time_total: Duration,
    pub acquire_time_avg: Duration,
    pub acquire_time_max: Duration,
    pub acquire_time_total: Duration,
}

impl MetricsSnapshot {
    /// Connections currently owned by the pool or its callers
    pub fn total(&self) -> usize {
        self.active_count + self.idle_count
    }

    /// Share of connections in use, from 0.0 to 1.0.
    ///
    /// Returns 0.0 for an empty pool.
    pub fn utilization(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.active_count as f64 / total as f64,
        }
    }

    /// Whether every connection is checked out
    pub fn is_full(&self) -> bool {
        self.idle_count == 0 && self.total() > 0
    }
}
