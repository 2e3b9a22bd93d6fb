//! Point-in-time pool gauges

use serde::{Deserialize, Serialize};

/// The shape of a pool at one instant
///
/// Unlike [`MetricsSnapshot`](crate::MetricsSnapshot) these are always
/// available, whether or not metrics are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    idle: usize,
    active: usize,
    /// Connections being created or validated in the background
    in_flight: usize,
    /// Callers blocked in `acquire` waiting for a release or a creation
    waiting: usize,
}

impl PoolStats {
    pub fn new(idle: usize, active: usize, in_flight: usize, waiting: usize) -> Self {
        Self {
            idle,
            active,
            in_flight,
            waiting,
        }
    }

    /// Every connection the pool accounts for, counted against `max_size`
    pub fn total(&self) -> usize {
        self.idle + self.active + self.in_flight
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Share of connections checked out (0.0 to 1.0), 0.0 for an empty pool
    pub fn utilization(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.active as f64 / total as f64,
        }
    }

    /// Whether nothing is idle and nothing is on its way
    pub fn is_exhausted(&self) -> bool {
        self.idle == 0 && self.in_flight == 0 && self.active > 0
    }
}
