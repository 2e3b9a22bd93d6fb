//! Connection factory trait

use std::sync::Arc;

use async_trait::async_trait;
use reservoir_core::{RawConnection, Result};

/// Produces new raw connections for a pool.
///
/// Failures are reported to the caller of `acquire` that needed the
/// connection. The pool never retries on its own; wrap the factory in
/// [`crate::retry::RetryingFactory`] for that.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new physical connection
    async fn create(&self) -> Result<Box<dyn RawConnection>>;

    /// Validate that a connection is still usable
    ///
    /// Default implementation asks the connection itself.
    async fn validate(&self, conn: &mut dyn RawConnection) -> bool {
        conn.is_valid().await.unwrap_or(false)
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Box<dyn RawConnection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &mut dyn RawConnection) -> bool {
        (**self).validate(conn).await
    }
}
