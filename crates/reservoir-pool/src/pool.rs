//! Connection pooling for raw connections
//!
//! This module provides the pool core: bounded acquisition with a deadline,
//! baseline enforcement on checkout, failure classification on release,
//! background refill, leak detection, validation and reaping.
//!
//! # Example
//!
//! ```ignore
//! use reservoir_pool::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(5, 20)
//!     .with_acquire_timeout_ms(5000)
//!     .with_idle_timeout_ms(300000);
//!
//! let pool = ConnectionPool::new(config, connection_factory);
//! let mut conn = pool.get().await?;
//! conn.set_auto_commit(false).await?;
//! // Use connection...
//! pool.release(conn, None).await?;
//! // or just drop it: the connection is returned to the pool
//! ```

mod config;
mod guard;
mod housekeeping;
mod pool;
mod state;
mod stats;


pub use config::PoolConfig;
pub use guard::PooledConnection;
pub use pool::{ConnectionPool, FlushMode};
pub use stats::PoolStats;
