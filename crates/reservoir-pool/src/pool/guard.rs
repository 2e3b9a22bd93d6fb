//! Checked-out connection guard

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use reservoir_core::{FailureRecord, RawConnection};
use uuid::Uuid;

use super::pool::PoolInner;
use crate::handle::{ConnectionHandle, HandleId};

/// A connection borrowed from the pool
///
/// Dereferences to the raw connection. Hand it back with
/// [`ConnectionPool::release`](super::ConnectionPool::release) to report a
/// failure, or simply drop it: dropping is a release without a failure,
/// unless one was recorded with [`PooledConnection::report_failure`].
pub struct PooledConnection {
    handle: Option<ConnectionHandle>,
    pool: Arc<PoolInner>,
    failures: Vec<FailureRecord>,
}

impl PooledConnection {
    pub(super) fn new(pool: Arc<PoolInner>, handle: ConnectionHandle) -> Self {
        Self {
            handle: Some(handle),
            pool,
            failures: Vec::new(),
        }
    }

    pub fn id(&self) -> HandleId {
        self.handle().id()
    }

    /// The pool-side view of this connection
    pub fn handle(&self) -> &ConnectionHandle {
        self.handle.as_ref().expect("connection taken")
    }

    pub(super) fn handle_mut(&mut self) -> &mut ConnectionHandle {
        self.handle.as_mut().expect("connection taken")
    }

    pub(super) fn pool_id(&self) -> Uuid {
        self.handle().pool_id()
    }

    /// Record an error seen on this connection.
    ///
    /// It is classified when the connection goes back to the pool, whether
    /// through `release` or by being dropped.
    pub fn report_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    /// Failures recorded so far and not yet handed to the pool
    pub fn reported_failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Detach the handle and failures; the guard no longer returns anything on drop
    pub(super) fn into_parts(mut self) -> (ConnectionHandle, Vec<FailureRecord>) {
        let handle = self.handle.take().expect("connection taken");
        let failures = std::mem::take(&mut self.failures);
        (handle, failures)
    }
}

impl Deref for PooledConnection {
    type Target = dyn RawConnection;

    fn deref(&self) -> &Self::Target {
        self.handle().raw()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle_mut().raw_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let failures = std::mem::take(&mut self.failures);
            self.pool.return_dropped(handle, failures);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("handle", &self.handle)
            .field("failures", &self.failures.len())
            .finish()
    }
}
