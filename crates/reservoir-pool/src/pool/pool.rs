//! Connection pool implementation

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reservoir_core::{FailureRecord, ReservoirError, Result};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::config::PoolConfig;
use super::guard::PooledConnection;
use super::housekeeping::spawn_housekeeper;
use super::state::PoolState;
use super::stats::PoolStats;
use crate::baseline::BaselineConfig;
use crate::classifier::FailureClassifier;
use crate::enforcer::StateEnforcer;
use crate::factory::ConnectionFactory;
use crate::handle::{ConnectionHandle, HandleId, HandleState};
use crate::metrics::{MetricsSnapshot, PoolMetrics};

/// What `flush` removes from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushMode {
    /// Destroy every idle connection
    Idle,
    /// Destroy idle connections now and checked-out ones when they are released
    All,
    /// Validate idle connections and destroy the ones that fail
    Invalid,
    /// Only create connections up to the minimum size
    Fill,
}

/// Why a handle is being destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DestroyReason {
    Fatal,
    Invalid,
    EnforcementFailed,
    MaxLifetime,
    Reaped,
    Flushed,
    Explicit,
    Rejected,
    Shutdown,
}

impl std::fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DestroyReason::Fatal => "fatal failure",
            DestroyReason::Invalid => "validation failed",
            DestroyReason::EnforcementFailed => "baseline could not be restored",
            DestroyReason::MaxLifetime => "max lifetime exceeded",
            DestroyReason::Reaped => "idle timeout",
            DestroyReason::Flushed => "flushed",
            DestroyReason::Explicit => "destroyed by caller",
            DestroyReason::Rejected => "returned while not checked out",
            DestroyReason::Shutdown => "pool shutdown",
        };
        f.write_str(reason)
    }
}

/// Outcome of taking a handle back from a caller
enum Disposition {
    Idle,
    Destroy(ConnectionHandle, DestroyReason),
    Rejected(ConnectionHandle, ReservoirError),
}

/// Next move for an acquiring caller, decided under the pool lock
enum Step {
    Take(PooledConnection),
    Create(CreationSlot),
    Wait,
}

/// A reserved place under `max_size` for a connection being created.
///
/// Dropping an unfilled slot gives the place back.
pub(super) struct CreationSlot {
    inner: Arc<PoolInner>,
    armed: bool,
}

impl CreationSlot {
    fn new(inner: Arc<PoolInner>) -> Self {
        Self { inner, armed: true }
    }

    fn fill(mut self, handle: ConnectionHandle) -> CreatedHandle {
        self.armed = false;
        CreatedHandle {
            inner: self.inner.clone(),
            handle: Some(handle),
        }
    }
}

impl Drop for CreationSlot {
    fn drop(&mut self) {
        if self.armed {
            self.inner.state.lock().pending -= 1;
            self.inner.available.notify_one();
        }
    }
}

/// A freshly created handle on its way to the caller that asked for it.
///
/// If nobody claims it (the caller timed out, or it was a background fill)
/// it is parked in the idle queue when dropped.
pub(super) struct CreatedHandle {
    inner: Arc<PoolInner>,
    handle: Option<ConnectionHandle>,
}

impl CreatedHandle {
    fn claim(mut self) -> Result<PooledConnection> {
        let inner = self.inner.clone();
        let handle = self.handle.take().expect("connection taken");
        {
            let mut state = inner.state.lock();
            state.pending -= 1;
            if !state.shutdown {
                state.register_checkout(handle.id());
                return Ok(PooledConnection::new(inner.clone(), handle));
            }
        }
        inner.discard(handle, DestroyReason::Shutdown);
        Err(ReservoirError::PoolShutdown)
    }
}

impl Drop for CreatedHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.inner.park(handle, Parked::Created);
        }
    }
}

/// Where a handle being parked in the idle queue was counted before
#[derive(Debug, Clone, Copy)]
pub(super) enum Parked {
    Created,
    Validated,
}

/// Counts an acquire that had to wait, until the acquire finishes
struct Waiting<'a>(&'a PoolInner);

impl<'a> Waiting<'a> {
    fn enter(inner: &'a PoolInner) -> Self {
        inner.state.lock().waiting += 1;
        Self(inner)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.state.lock().waiting -= 1;
    }
}

/// Run a future on the current tokio runtime, if there is one.
///
/// Returns false if there was no runtime and the future was dropped unrun.
pub(super) fn spawn_detached<F>(future: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(future);
            true
        }
        Err(_) => false,
    }
}

fn creation_error(err: ReservoirError) -> ReservoirError {
    match err {
        ReservoirError::Creation(_) => err,
        other => ReservoirError::Creation(other.to_string()),
    }
}

/// State shared between the pool, its guards and its background tasks
pub(crate) struct PoolInner {
    pub(super) id: Uuid,
    pub(super) config: PoolConfig,
    pub(super) factory: Arc<dyn ConnectionFactory>,
    pub(super) classifier: Arc<dyn FailureClassifier>,
    pub(super) enforcer: StateEnforcer,
    pub(super) metrics: PoolMetrics,
    pub(super) state: Mutex<PoolState>,
    /// Signalled when an idle handle or a free slot appears
    pub(super) available: Notify,
    /// Signalled when the last checked-out handle comes back during shutdown
    pub(super) drained: Notify,
    next_handle_id: AtomicU64,
    housekeeper: Mutex<Option<JoinHandle<()>>>,
}

impl PoolInner {
    fn next_id(&self) -> HandleId {
        HandleId::new(self.next_handle_id.fetch_add(1, Ordering::Relaxed))
    }

    fn next_step(self: &Arc<Self>) -> Result<Step> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(ReservoirError::PoolShutdown);
        }
        if let Some(handle) = state.idle.pop_front() {
            state.register_checkout(handle.id());
            return Ok(Step::Take(PooledConnection::new(self.clone(), handle)));
        }
        if state.size() < self.config.max_size() {
            state.pending += 1;
            return Ok(Step::Create(CreationSlot::new(self.clone())));
        }
        Ok(Step::Wait)
    }

    /// Open, initialize and account for one new connection
    async fn create(self: &Arc<Self>, slot: CreationSlot) -> Result<CreatedHandle> {
        let started = Instant::now();
        let created = match self.config.baseline().login_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.factory.create()).await {
                Ok(result) => result,
                Err(_) => Err(ReservoirError::Timeout(format!(
                    "login timed out after {:?}",
                    limit
                ))),
            },
            None => self.factory.create().await,
        };
        let raw = match created {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(pool_id = %self.id, error = %err, "failed to create connection");
                return Err(creation_error(err));
            }
        };

        let generation = self.state.lock().generation;
        let mut handle = ConnectionHandle::new(self.next_id(), self.id, raw, generation);
        if let Err(err) = self.enforcer.initialize(&mut handle).await {
            tracing::warn!(handle_id = %handle.id(), error = %err, "failed to initialize new connection");
            let _ = handle.close().await;
            return Err(ReservoirError::Creation(format!(
                "failed to initialize connection: {}",
                err
            )));
        }

        let elapsed = started.elapsed();
        self.metrics.record_creation(elapsed);
        tracing::debug!(handle_id = %handle.id(), ?elapsed, "created connection");
        Ok(slot.fill(handle))
    }

    /// Create in the background, delivering the result to whoever still listens
    fn spawn_creation(self: &Arc<Self>, slot: CreationSlot) -> oneshot::Receiver<Result<CreatedHandle>> {
        let (tx, rx) = oneshot::channel();
        let inner = self.clone();
        let spawned = spawn_detached(async move {
            let result = inner.create(slot).await;
            // An unclaimed handle parks itself in the idle queue on drop
            let _ = tx.send(result);
        });
        if !spawned {
            tracing::warn!(pool_id = %self.id, "no tokio runtime available, cannot create connection");
        }
        rx
    }

    /// Create connections until the pool holds at least `target`
    pub(super) fn fill_to(self: &Arc<Self>, target: usize) {
        let slots: Vec<CreationSlot> = {
            let mut state = self.state.lock();
            if state.shutdown {
                return;
            }
            let missing = target
                .min(self.config.max_size())
                .saturating_sub(state.size());
            state.pending += missing;
            (0..missing).map(|_| CreationSlot::new(self.clone())).collect()
        };

        for slot in slots {
            let inner = self.clone();
            let spawned = spawn_detached(async move {
                // Dropping the created handle parks it as idle
                let _ = inner.create(slot).await;
            });
            if !spawned {
                tracing::warn!(pool_id = %self.id, "no tokio runtime available, skipping background fill");
                break;
            }
        }
    }

    pub(super) fn fill_to_min(self: &Arc<Self>) {
        self.fill_to(self.config.min_size());
    }

    /// Put a handle that was counted as pending or validating into the idle queue
    pub(super) fn park(self: &Arc<Self>, mut handle: ConnectionHandle, from: Parked) {
        let rejected = {
            let mut state = self.state.lock();
            match from {
                Parked::Created => {
                    state.pending -= 1;
                    handle.mark_idle();
                }
                Parked::Validated => state.validating -= 1,
            }
            if state.shutdown {
                Some(handle)
            } else {
                state.idle.push_back(handle);
                None
            }
        };
        match rejected {
            Some(handle) => self.discard(handle, DestroyReason::Shutdown),
            None => self.available.notify_one(),
        }
    }

    /// Validate, lifetime-check and reset a handle before handing it out.
    ///
    /// Returns `None` when the handle had to be destroyed instead.
    async fn prepare_checkout(
        self: &Arc<Self>,
        mut conn: PooledConnection,
        fresh: bool,
    ) -> Option<PooledConnection> {
        if !fresh {
            if let Some(max_lifetime) = self.config.max_lifetime() {
                if conn.handle().age() >= max_lifetime {
                    self.discard_checked_out(conn, DestroyReason::MaxLifetime).await;
                    return None;
                }
            }

            if conn.handle_mut().take_warning_check() {
                if let Some(warning) = self.pending_warning(conn.handle_mut()).await {
                    conn.handle_mut().record_error();
                    if self.classifier.classify(&warning).is_fatal() {
                        tracing::warn!(
                            handle_id = %conn.id(),
                            failure = %warning,
                            "fatal warning left on dropped connection, connection will be destroyed"
                        );
                        self.discard_checked_out(conn, DestroyReason::Fatal).await;
                        return None;
                    }
                }
            }

            if let Some(threshold) = self.config.idle_validation() {
                if conn.handle().since_validated() >= threshold {
                    let handle = conn.handle_mut();
                    handle.transition(HandleState::Validating);
                    let valid = self.factory.validate(handle.raw_mut()).await;
                    handle.transition(HandleState::Idle);
                    if !valid {
                        self.discard_checked_out(conn, DestroyReason::Invalid).await;
                        return None;
                    }
                    conn.handle_mut().mark_validated();
                }
            }
        }

        let handle = conn.handle_mut();
        handle.transition(HandleState::CheckedOut);
        handle.touch();
        if let Err(err) = self.enforcer.checkout(handle).await {
            tracing::warn!(
                handle_id = %conn.id(),
                error = %err,
                "failed to restore connection baseline, discarding connection"
            );
            self.discard_checked_out(conn, DestroyReason::EnforcementFailed)
                .await;
            return None;
        }

        let in_use = self.state.lock().checked_out.len();
        self.metrics.record_in_use(in_use);
        tracing::debug!(handle_id = %conn.id(), "connection checked out");
        Some(conn)
    }

    /// The warning the last holder left on the connection, if it can be read
    async fn pending_warning(&self, handle: &mut ConnectionHandle) -> Option<FailureRecord> {
        match handle.raw_mut().warnings().await {
            Ok(warning) => warning,
            Err(err) => {
                tracing::debug!(handle_id = %handle.id(), error = %err, "could not read pending warnings");
                None
            }
        }
    }

    /// Move a handle from checked-out back to idle, or decide to destroy it.
    fn checkin(&self, mut handle: ConnectionHandle, failures: &[FailureRecord]) -> Disposition {
        let fatal = failures
            .iter()
            .find(|failure| self.classifier.classify(failure).is_fatal());
        for failure in failures {
            handle.record_error();
            if fatal.is_none() {
                tracing::debug!(handle_id = %handle.id(), failure = %failure, "transient failure reported");
            }
        }
        if let Some(failure) = fatal {
            tracing::warn!(
                handle_id = %handle.id(),
                failure = %failure,
                "fatal failure reported, connection will be destroyed"
            );
        }

        let mut state = self.state.lock();
        if state.checked_out.remove(&handle.id()).is_none() {
            drop(state);
            let err = ReservoirError::ProtocolMisuse(format!(
                "connection {} is not checked out",
                handle.id()
            ));
            return Disposition::Rejected(handle, err);
        }

        if handle.state() == HandleState::Validating {
            // Caller went away in the middle of validation, so the outcome is unknown
            handle.transition(HandleState::Idle);
        }

        let reason = if state.shutdown {
            Some(DestroyReason::Shutdown)
        } else if fatal.is_some() {
            Some(DestroyReason::Fatal)
        } else if handle.generation() < state.generation {
            Some(DestroyReason::Flushed)
        } else if self
            .config
            .max_lifetime()
            .is_some_and(|max_lifetime| handle.age() >= max_lifetime)
        {
            Some(DestroyReason::MaxLifetime)
        } else {
            None
        };

        let drained = state.shutdown && state.checked_out.is_empty();
        let disposition = match reason {
            Some(reason) => Disposition::Destroy(handle, reason),
            None => {
                self.enforcer.checkin(&mut handle);
                if handle.state() == HandleState::CheckedOut {
                    handle.transition(HandleState::Idle);
                }
                handle.mark_idle();
                tracing::debug!(handle_id = %handle.id(), "connection checked in");
                state.idle.push_back(handle);
                Disposition::Idle
            }
        };
        drop(state);

        // Either an idle handle or a free slot just appeared
        self.available.notify_one();
        if drained {
            self.drained.notify_waiters();
        }
        disposition
    }

    /// Checkin path for guards that were dropped instead of released
    ///
    /// Warnings cannot be read without awaiting, so they are classified at
    /// the next checkout instead.
    pub(super) fn return_dropped(self: &Arc<Self>, mut handle: ConnectionHandle, failures: Vec<FailureRecord>) {
        handle.defer_warning_check();
        match self.checkin(handle, &failures) {
            Disposition::Idle => {}
            Disposition::Destroy(handle, reason) => self.discard(handle, reason),
            Disposition::Rejected(handle, err) => {
                tracing::warn!(error = %err, "dropped connection was not registered with its pool");
                self.discard(handle, DestroyReason::Rejected);
            }
        }
    }

    /// Forget a checked-out handle. Returns false if it was not registered.
    fn unregister(&self, id: HandleId) -> bool {
        let (registered, drained) = {
            let mut state = self.state.lock();
            let registered = state.checked_out.remove(&id).is_some();
            (registered, state.shutdown && state.checked_out.is_empty())
        };
        self.available.notify_one();
        if drained {
            self.drained.notify_waiters();
        }
        registered
    }

    async fn discard_checked_out(self: &Arc<Self>, conn: PooledConnection, reason: DestroyReason) {
        let (handle, _) = conn.into_parts();
        self.unregister(handle.id());
        self.destroy_handle(handle, reason).await;
    }

    /// Close a handle that is no longer counted anywhere, then refill
    pub(super) async fn destroy_handle(self: &Arc<Self>, mut handle: ConnectionHandle, reason: DestroyReason) {
        self.record_destruction(reason);
        tracing::debug!(handle_id = %handle.id(), reason = %reason, "destroying connection");
        if let Err(err) = handle.close().await {
            tracing::warn!(handle_id = %handle.id(), error = %err, "error while closing connection");
        }
        self.fill_to_min();
    }

    fn record_destruction(&self, reason: DestroyReason) {
        self.metrics.record_destruction();
        match reason {
            DestroyReason::Fatal | DestroyReason::Invalid | DestroyReason::EnforcementFailed => {
                self.metrics.record_invalid()
            }
            DestroyReason::Reaped => self.metrics.record_reap(),
            _ => {}
        }
    }

    /// `destroy_handle` for contexts that cannot await
    pub(super) fn discard(self: &Arc<Self>, handle: ConnectionHandle, reason: DestroyReason) {
        let id = handle.id();
        let inner = self.clone();
        let spawned = spawn_detached(async move {
            inner.destroy_handle(handle, reason).await;
        });
        if !spawned {
            // The raw connection was dropped without being closed
            self.record_destruction(reason);
            tracing::warn!(
                handle_id = %id,
                reason = %reason,
                "no tokio runtime available, connection dropped without closing"
            );
        }
    }

    fn drain_idle(&self) -> Vec<ConnectionHandle> {
        self.state.lock().idle.drain(..).collect()
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state.lock().checked_out.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let idle: Vec<ConnectionHandle> = self.state.get_mut().idle.drain(..).collect();
        if idle.is_empty() {
            return;
        }
        let count = idle.len();
        let spawned = spawn_detached(async move {
            for mut handle in idle {
                let _ = handle.close().await;
            }
        });
        if !spawned {
            tracing::warn!(pool_id = %self.id, count, "no tokio runtime available, idle connections dropped without closing");
        }
    }
}

/// A pool of raw connections
///
/// The pool keeps between `min_size` and `max_size` connections. Every
/// connection it hands out has been reset to the configured baseline, and
/// every connection returned with a failure is run past the failure
/// classifier. Cloning the pool is cheap and yields another handle to the
/// same pool.
///
/// A tokio runtime must be running when the pool is created; background
/// creation and housekeeping are spawned onto it.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    ///
    /// The failure classifier is the one selected in the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`PoolConfig::validate`].
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let classifier = config.classifier().build();
        Self::with_classifier(config, factory, classifier)
    }

    /// Create a pool with a custom failure classifier
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`PoolConfig::validate`].
    pub fn with_classifier<F: ConnectionFactory>(
        config: PoolConfig,
        factory: F,
        classifier: Arc<dyn FailureClassifier>,
    ) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid pool configuration: {}", err);
        }

        let inner = Arc::new(PoolInner {
            id: Uuid::new_v4(),
            enforcer: StateEnforcer::new(config.baseline().clone()),
            metrics: PoolMetrics::new(config.metrics_enabled()),
            config,
            factory: Arc::new(factory),
            classifier,
            state: Mutex::new(PoolState::new()),
            available: Notify::new(),
            drained: Notify::new(),
            next_handle_id: AtomicU64::new(1),
            housekeeper: Mutex::new(None),
        });

        tracing::info!(
            pool_id = %inner.id,
            min_size = inner.config.min_size(),
            max_size = inner.config.max_size(),
            "starting connection pool"
        );
        inner.fill_to(inner.config.initial_size());
        *inner.housekeeper.lock() = spawn_housekeeper(&inner);

        Self { inner }
    }

    /// Get a connection using the configured acquire timeout
    pub async fn get(&self) -> Result<PooledConnection> {
        self.acquire(self.inner.config.acquire_timeout()).await
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Take an idle connection and reset it to the baseline
    /// 2. If none is idle and the pool is under max_size, create a new one
    /// 3. If at max_size, wait for a release or a creation to complete
    ///
    /// Returns `AcquireTimeout` if nothing became available within `timeout`,
    /// `Creation` if the connection this call needed could not be opened, and
    /// `PoolShutdown` once shutdown has begun.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.acquire_inner()).await {
            Ok(Ok(conn)) => {
                self.inner.metrics.record_acquire(started.elapsed());
                Ok(conn)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                self.inner.metrics.record_timeout();
                tracing::debug!(pool_id = %self.inner.id, ?timeout, "timed out waiting for connection");
                Err(ReservoirError::AcquireTimeout(timeout))
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PooledConnection> {
        let inner = &self.inner;
        let mut waiting = None;
        loop {
            // Register interest before looking, so a release in between is not missed
            let notified = inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match inner.next_step()? {
                Step::Take(conn) => {
                    if let Some(conn) = inner.prepare_checkout(conn, false).await {
                        return Ok(conn);
                    }
                }
                Step::Create(slot) => match inner.spawn_creation(slot).await {
                    Ok(Ok(created)) => {
                        let conn = created.claim()?;
                        if let Some(conn) = inner.prepare_checkout(conn, true).await {
                            return Ok(conn);
                        }
                    }
                    Ok(Err(err)) => return Err(err),
                    // Creation task vanished without an answer; try again
                    Err(_) => continue,
                },
                Step::Wait => {
                    if waiting.is_none() {
                        waiting = Some(Waiting::enter(inner));
                    }
                    notified.await
                }
            }
        }
    }

    /// Return a connection to the pool
    ///
    /// A failure, together with any recorded through
    /// [`PooledConnection::report_failure`] and any warning still pending on
    /// the connection, is classified: a fatal one
    /// destroys the connection (and schedules a replacement if the pool drops
    /// below its minimum), a transient one lets it return to the idle set.
    ///
    /// Returns `ProtocolMisuse` for a connection this pool did not lend or
    /// no longer considers checked out. A connection from another pool goes
    /// back to that pool.
    pub async fn release(&self, conn: PooledConnection, failure: Option<FailureRecord>) -> Result<()> {
        if conn.pool_id() != self.inner.id {
            let id = conn.id();
            drop(conn);
            return Err(ReservoirError::ProtocolMisuse(format!(
                "connection {} was not acquired from this pool",
                id
            )));
        }

        let (mut handle, mut failures) = conn.into_parts();
        failures.extend(failure);
        if let Some(warning) = self.inner.pending_warning(&mut handle).await {
            if !failures.contains(&warning) {
                failures.push(warning);
            }
        }
        match self.inner.checkin(handle, &failures) {
            Disposition::Idle => Ok(()),
            Disposition::Destroy(handle, reason) => {
                self.inner.destroy_handle(handle, reason).await;
                Ok(())
            }
            Disposition::Rejected(handle, err) => {
                self.inner.destroy_handle(handle, DestroyReason::Rejected).await;
                Err(err)
            }
        }
    }

    /// Remove a checked-out connection from the pool and close it
    ///
    /// The pool refills to its minimum size in the background.
    pub async fn destroy(&self, conn: PooledConnection) -> Result<()> {
        if conn.pool_id() != self.inner.id {
            let id = conn.id();
            drop(conn);
            return Err(ReservoirError::ProtocolMisuse(format!(
                "connection {} was not acquired from this pool",
                id
            )));
        }

        let (handle, _) = conn.into_parts();
        let id = handle.id();
        let registered = self.inner.unregister(id);
        self.inner.destroy_handle(handle, DestroyReason::Explicit).await;
        if registered {
            Ok(())
        } else {
            Err(ReservoirError::ProtocolMisuse(format!(
                "connection {} is not checked out",
                id
            )))
        }
    }

    /// Remove connections from the pool according to `mode`, then refill
    pub async fn flush(&self, mode: FlushMode) {
        let inner = &self.inner;
        inner.metrics.record_flush();
        tracing::info!(pool_id = %inner.id, ?mode, "flushing connection pool");

        match mode {
            FlushMode::Idle | FlushMode::All => {
                if mode == FlushMode::All {
                    inner.state.lock().generation += 1;
                }
                for handle in inner.drain_idle() {
                    inner.destroy_handle(handle, DestroyReason::Flushed).await;
                }
            }
            FlushMode::Invalid => inner.validate_idle(|_| true).await,
            FlushMode::Fill => {}
        }
        inner.fill_to_min();
    }

    /// Stop lending connections and close them all
    ///
    /// Idle connections are closed immediately and waiters fail with
    /// `PoolShutdown`. Checked-out connections are closed as they come back;
    /// this waits up to the configured grace period for that to happen.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let (idle, checked_out) = {
            let mut state = inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            let idle: Vec<ConnectionHandle> = state.idle.drain(..).collect();
            (idle, state.checked_out.len())
        };

        tracing::info!(
            pool_id = %inner.id,
            idle = idle.len(),
            checked_out,
            "shutting down connection pool"
        );
        inner.available.notify_waiters();
        // The housekeeper notices the flag and exits on its next tick
        drop(inner.housekeeper.lock().take());

        for handle in idle {
            inner.destroy_handle(handle, DestroyReason::Shutdown).await;
        }

        let grace = inner.config.shutdown_grace();
        if checked_out > 0 && !grace.is_zero() {
            let _ = tokio::time::timeout(grace, inner.wait_drained()).await;
        }

        let remaining = inner.state.lock().checked_out.len();
        if remaining > 0 {
            tracing::warn!(
                pool_id = %inner.id,
                remaining,
                "connections still checked out at shutdown will be closed on release"
            );
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats::new(
            state.idle.len(),
            state.checked_out.len(),
            state.pending + state.validating,
            state.waiting,
        )
    }

    /// Get current pool metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let (active, idle, awaiting) = {
            let state = self.inner.state.lock();
            (state.checked_out.len(), state.idle.len(), state.waiting)
        };
        self.inner.metrics.snapshot(active, idle, awaiting)
    }

    /// Zero the cumulative metric counters
    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    /// Connections that exist or are being created
    pub fn size(&self) -> usize {
        self.inner.state.lock().size()
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn baseline(&self) -> &BaselineConfig {
        self.inner.enforcer.baseline()
    }

    pub fn enforcer(&self) -> &StateEnforcer {
        &self.inner.enforcer
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("size", &self.size())
            .field("config", &self.inner.config)
            .finish()
    }
}
