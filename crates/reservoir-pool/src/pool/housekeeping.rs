//! Periodic pool maintenance: leak detection, reaping, validation, refill

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::pool::{DestroyReason, Parked, PoolInner};
use crate::handle::{ConnectionHandle, HandleState};

/// Start the housekeeping task for a pool.
///
/// The task only holds a weak reference, so it stops once the pool is
/// dropped or shut down.
pub(super) fn spawn_housekeeper(inner: &Arc<PoolInner>) -> Option<JoinHandle<()>> {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            tracing::warn!(pool_id = %inner.id, "no tokio runtime available, housekeeping disabled");
            return None;
        }
    };

    let weak: Weak<PoolInner> = Arc::downgrade(inner);
    let period = inner.config.housekeeping_interval();
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if inner.state.lock().shutdown {
                break;
            }
            inner.housekeep().await;
        }
        tracing::debug!("pool housekeeper stopped");
    }))
}

/// An idle handle taken out of the queue for validation.
///
/// Goes back to the idle queue when dropped.
struct ValidatingHandle {
    inner: Arc<PoolInner>,
    handle: Option<ConnectionHandle>,
}

impl ValidatingHandle {
    fn handle_mut(&mut self) -> &mut ConnectionHandle {
        self.handle.as_mut().expect("connection taken")
    }

    /// Take the handle out for destruction
    fn reject(mut self) -> ConnectionHandle {
        let handle = self.handle.take().expect("connection taken");
        self.inner.state.lock().validating -= 1;
        handle
    }
}

impl Drop for ValidatingHandle {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if handle.state() == HandleState::Validating {
                handle.transition(HandleState::Idle);
            }
            self.inner.park(handle, Parked::Validated);
        }
    }
}

impl PoolInner {
    /// One maintenance pass
    pub(super) async fn housekeep(self: &Arc<Self>) {
        self.detect_leaks();
        self.reap_idle().await;
        if let Some(interval) = self.config.validation_interval() {
            self.validate_idle(|handle| handle.since_validated() >= interval)
                .await;
        }
        self.fill_to_min();
    }

    /// Warn once about every checkout held longer than the leak timeout
    fn detect_leaks(&self) {
        let Some(leak_timeout) = self.config.leak_timeout() else {
            return;
        };

        let mut state = self.state.lock();
        for (id, record) in state.checked_out.iter_mut() {
            let held = record.acquired_at.elapsed();
            if !record.leak_reported && held >= leak_timeout {
                record.leak_reported = true;
                self.metrics.record_leak();
                tracing::warn!(
                    pool_id = %self.id,
                    handle_id = %id,
                    ?held,
                    "possible connection leak: connection held longer than leak timeout"
                );
            }
        }
    }

    /// Destroy idle handles past their lifetime, and idle-timed-out handles
    /// while the pool is above its minimum size
    async fn reap_idle(self: &Arc<Self>) {
        let idle_timeout = self.config.idle_timeout();
        let max_lifetime = self.config.max_lifetime();
        let min_size = self.config.min_size();

        let doomed: Vec<(ConnectionHandle, DestroyReason)> = {
            let mut state = self.state.lock();
            let mut size = state.size();
            let mut kept = std::collections::VecDeque::with_capacity(state.idle.len());
            let mut doomed = Vec::new();
            for handle in state.idle.drain(..) {
                if max_lifetime.is_some_and(|max_lifetime| handle.age() >= max_lifetime) {
                    size -= 1;
                    doomed.push((handle, DestroyReason::MaxLifetime));
                } else if size > min_size && handle.idle_for() >= idle_timeout {
                    size -= 1;
                    doomed.push((handle, DestroyReason::Reaped));
                } else {
                    kept.push_back(handle);
                }
            }
            state.idle = kept;
            doomed
        };

        if !doomed.is_empty() {
            tracing::debug!(pool_id = %self.id, count = doomed.len(), "reaping idle connections");
        }
        for (handle, reason) in doomed {
            self.destroy_handle(handle, reason).await;
        }
    }

    /// Validate the idle handles selected by `due`, destroying those that fail
    pub(super) async fn validate_idle<P>(self: &Arc<Self>, due: P)
    where
        P: Fn(&ConnectionHandle) -> bool,
    {
        let selected: Vec<ValidatingHandle> = {
            let mut state = self.state.lock();
            let (selected, kept): (Vec<_>, Vec<_>) = state.idle.drain(..).partition(|h| due(h));
            state.idle = kept.into();
            state.validating += selected.len();
            selected
                .into_iter()
                .map(|handle| ValidatingHandle {
                    inner: self.clone(),
                    handle: Some(handle),
                })
                .collect()
        };

        for mut validating in selected {
            let handle = validating.handle_mut();
            handle.transition(HandleState::Validating);
            let valid = self.factory.validate(handle.raw_mut()).await;
            handle.transition(HandleState::Idle);

            if valid {
                handle.mark_validated();
            } else {
                let handle = validating.reject();
                tracing::debug!(handle_id = %handle.id(), "idle connection failed validation");
                self.destroy_handle(handle, DestroyReason::Invalid).await;
            }
        }
    }
}
