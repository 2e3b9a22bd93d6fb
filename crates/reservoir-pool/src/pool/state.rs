//! Shared pool bookkeeping

use std::collections::{HashMap, VecDeque};

use tokio::time::Instant;

use crate::handle::{ConnectionHandle, HandleId};

/// Bookkeeping for one checked-out handle
pub(super) struct CheckoutRecord {
    pub acquired_at: Instant,
    pub leak_reported: bool,
}

/// Everything guarded by the pool lock.
///
/// A handle is counted in exactly one place: the idle queue, the
/// checked-out map, or one of the in-flight counters (being created, or
/// being validated by housekeeping).
pub(super) struct PoolState {
    pub idle: VecDeque<ConnectionHandle>,
    pub checked_out: HashMap<HandleId, CheckoutRecord>,
    /// Creations in flight, including created handles not yet claimed
    pub pending: usize,
    /// Idle handles taken out for background validation
    pub validating: usize,
    /// Callers inside `acquire` that found nothing idle and no room to create
    pub waiting: usize,
    /// Bumped by a full flush; older handles are destroyed on release
    pub generation: u64,
    pub shutdown: bool,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            checked_out: HashMap::new(),
            pending: 0,
            validating: 0,
            waiting: 0,
            generation: 0,
            shutdown: false,
        }
    }

    /// Connections that exist or are being created
    pub fn size(&self) -> usize {
        self.idle.len() + self.checked_out.len() + self.pending + self.validating
    }

    pub fn register_checkout(&mut self, id: HandleId) {
        self.checked_out.insert(
            id,
            CheckoutRecord {
                acquired_at: Instant::now(),
                leak_reported: false,
            },
        );
    }
}
