//! Pool-private wrapper around one raw connection

use reservoir_core::{RawConnection, Result};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Identifier of a connection handle, unique within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Just created by the factory; baseline not applied yet
    New,
    /// Baseline being applied, or the connection being validated
    Validating,
    /// Available for acquisition
    Idle,
    /// Held by exactly one caller
    CheckedOut,
    /// Closed and removed from the pool
    Destroyed,
}

impl HandleState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: HandleState) -> bool {
        use HandleState::*;
        match (self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (New, Validating) => true,
            (Validating, Idle) => true,
            (Idle, Validating) | (Idle, CheckedOut) => true,
            (CheckedOut, Idle) => true,
            _ => false,
        }
    }
}

/// One raw connection plus the bookkeeping the pool keeps about it.
///
/// A handle is never shared: the pool owns it while idle, a single caller
/// owns it while checked out. Only the pool and the state enforcer move it
/// between states.
pub struct ConnectionHandle {
    id: HandleId,
    pool_id: Uuid,
    raw: Box<dyn RawConnection>,
    state: HandleState,
    created_at: Instant,
    last_acquired_at: Instant,
    idle_since: Instant,
    last_validated_at: Instant,
    dirty: bool,
    /// Returned by a dropped guard, so pending warnings were never classified
    unclassified_warnings: bool,
    error_count: u32,
    /// Flush generation the handle was created in
    generation: u64,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: HandleId,
        pool_id: Uuid,
        raw: Box<dyn RawConnection>,
        generation: u64,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            pool_id,
            raw,
            state: HandleState::New,
            created_at: now,
            last_acquired_at: now,
            idle_since: now,
            last_validated_at: now,
            dirty: false,
            unclassified_warnings: false,
            error_count: 0,
            generation,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Move to `next`, returning false (and staying put) if the lifecycle forbids it.
    pub(crate) fn transition(&mut self, next: HandleState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                handle_id = %self.id,
                from = ?self.state,
                to = ?next,
                "rejected invalid handle state transition"
            );
            false
        }
    }

    /// Whether the last holder may have changed session attributes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn defer_warning_check(&mut self) {
        self.unclassified_warnings = true;
    }

    /// Whether a warning check was deferred to this checkout; resets the flag
    pub(crate) fn take_warning_check(&mut self) -> bool {
        std::mem::take(&mut self.unclassified_warnings)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn last_acquired_at(&self) -> Instant {
        self.last_acquired_at
    }

    /// Time since the handle last went back to the pool (or was created)
    pub fn idle_for(&self) -> Duration {
        self.idle_since.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_acquired_at = Instant::now();
    }

    pub(crate) fn mark_idle(&mut self) {
        self.idle_since = Instant::now();
    }

    pub(crate) fn since_validated(&self) -> Duration {
        self.last_validated_at.elapsed()
    }

    pub(crate) fn mark_validated(&mut self) {
        self.last_validated_at = Instant::now();
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub(crate) fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn raw(&self) -> &(dyn RawConnection + 'static) {
        self.raw.as_ref()
    }

    pub fn raw_mut(&mut self) -> &mut (dyn RawConnection + 'static) {
        self.raw.as_mut()
    }

    /// Close the raw connection. The handle is `Destroyed` afterwards even if
    /// closing reported an error.
    pub(crate) async fn close(&mut self) -> Result<()> {
        if self.state == HandleState::Destroyed {
            return Ok(());
        }
        self.state = HandleState::Destroyed;
        self.raw.close().await
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("error_count", &self.error_count)
            .field("age", &self.age())
            .finish()
    }
}
