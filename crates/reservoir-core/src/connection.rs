//! Raw connection trait

use async_trait::async_trait;

use crate::{FailureRecord, ReservoirError, Result};

/// A physical connection to a backing store.
///
/// The pool owns each raw connection exclusively: while idle it is held by
/// the pool, while checked out by exactly one caller. Every operation
/// therefore takes `&mut self` and implementations need no internal locking.
///
/// Isolation levels cross this boundary as raw integers so vendor-specific
/// levels pass through untouched (see [`crate::IsolationLevel`]).
///
/// The optional session attributes (read-only, catalog, schema) have default
/// implementations. The pool only calls a setter when its baseline
/// configures that attribute.
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// Current transaction isolation level
    async fn transaction_isolation(&mut self) -> Result<i32>;

    /// Change the transaction isolation level
    async fn set_transaction_isolation(&mut self, level: i32) -> Result<()>;

    /// Current auto-commit mode
    async fn auto_commit(&mut self) -> Result<bool>;

    /// Change the auto-commit mode
    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    /// The first pending warning, if any
    async fn warnings(&mut self) -> Result<Option<FailureRecord>>;

    /// Discard all pending warnings
    async fn clear_warnings(&mut self) -> Result<()>;

    /// Execute a statement that returns no rows (used for init statements)
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Physically close the connection
    async fn close(&mut self) -> Result<()>;

    /// Check that the connection is still usable.
    ///
    /// Default implementation always returns true.
    async fn is_valid(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn read_only(&mut self) -> Result<bool> {
        Ok(false)
    }

    async fn set_read_only(&mut self, _read_only: bool) -> Result<()> {
        Err(ReservoirError::NotSupported(
            "read-only mode not supported by this connection".into(),
        ))
    }

    async fn catalog(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_catalog(&mut self, _catalog: &str) -> Result<()> {
        Err(ReservoirError::NotSupported(
            "catalogs not supported by this connection".into(),
        ))
    }

    async fn schema(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_schema(&mut self, _schema: &str) -> Result<()> {
        Err(ReservoirError::NotSupported(
            "schemas not supported by this connection".into(),
        ))
    }
}
