//! Baseline enforcement on checkout and checkin
//!
//! Checkin only marks a handle dirty. Reconciliation is deferred to the next
//! checkout so a handle that gets destroyed before reuse never pays for it.
//! At checkout a dirty handle has its isolation level, auto-commit mode,
//! read-only flag, catalog and schema read back and rewritten where they
//! differ from the baseline. A clean handle skips all of that. Warnings are
//! inspected on every checkout, dirty or not, and cleared when present.

use std::sync::atomic::{AtomicU64, Ordering};

use reservoir_core::{RawConnection, Result};

use crate::baseline::BaselineConfig;
use crate::handle::{ConnectionHandle, HandleState};

#[cfg(test)]
mod tests;

/// Applies a [`BaselineConfig`] to connection handles
#[derive(Debug)]
pub struct StateEnforcer {
    baseline: BaselineConfig,
    writes: AtomicU64,
}

impl StateEnforcer {
    pub fn new(baseline: BaselineConfig) -> Self {
        Self {
            baseline,
            writes: AtomicU64::new(0),
        }
    }

    pub fn baseline(&self) -> &BaselineConfig {
        &self.baseline
    }

    /// Number of attribute writes issued to raw connections so far
    pub fn writes_issued(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Bring a freshly created handle to the baseline.
    ///
    /// Runs the init statements, then reconciles every configured attribute.
    /// The handle goes `New -> Validating -> Idle`.
    pub async fn initialize(&self, handle: &mut ConnectionHandle) -> Result<()> {
        handle.transition(HandleState::Validating);

        for sql in self.baseline.init_sql() {
            tracing::debug!(handle_id = %handle.id(), sql = %sql, "running init statement");
            handle.raw_mut().execute(sql).await?;
        }
        self.reconcile(handle.raw_mut()).await?;

        handle.mark_clean();
        handle.mark_validated();
        handle.transition(HandleState::Idle);
        Ok(())
    }

    /// Prepare a handle that is being handed to a caller.
    pub async fn checkout(&self, handle: &mut ConnectionHandle) -> Result<()> {
        if handle.is_dirty() {
            self.reconcile(handle.raw_mut()).await?;
            handle.mark_clean();
        }

        if let Some(warning) = handle.raw_mut().warnings().await? {
            tracing::debug!(handle_id = %handle.id(), warning = %warning, "clearing pending warnings");
            handle.raw_mut().clear_warnings().await?;
            self.count_write();
        }
        Ok(())
    }

    /// Take a handle back from a caller. No I/O happens here.
    pub fn checkin(&self, handle: &mut ConnectionHandle) {
        handle.mark_dirty();
    }

    async fn reconcile(&self, raw: &mut dyn RawConnection) -> Result<()> {
        if let Some(isolation) = self.baseline.isolation() {
            // Compared as raw integers so vendor levels round-trip
            let wanted = isolation.level();
            if raw.transaction_isolation().await? != wanted {
                raw.set_transaction_isolation(wanted).await?;
                self.count_write();
            }
        }

        let auto_commit = self.baseline.auto_commit();
        if raw.auto_commit().await? != auto_commit {
            raw.set_auto_commit(auto_commit).await?;
            self.count_write();
        }

        let read_only = self.baseline.read_only();
        if raw.read_only().await? != read_only {
            raw.set_read_only(read_only).await?;
            self.count_write();
        }

        if let Some(catalog) = self.baseline.catalog() {
            if raw.catalog().await?.as_deref() != Some(catalog) {
                raw.set_catalog(catalog).await?;
                self.count_write();
            }
        }

        if let Some(schema) = self.baseline.schema() {
            if raw.schema().await?.as_deref() != Some(schema) {
                raw.set_schema(schema).await?;
                self.count_write();
            }
        }

        Ok(())
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}
