//! Reservoir Pool - Connection pooling with baseline enforcement
//!
//! This crate lends raw connections out of a bounded pool and guarantees
//! that every connection it hands out is in the configured baseline state,
//! whatever the previous borrower did to it.
//!
//! - `ConnectionPool` - Bounded acquire/release with timeouts and refill
//! - `StateEnforcer` - Restores isolation, auto-commit and friends on checkout
//! - `FailureClassifier` - Decides whether a reported failure kills a connection
//! - `PoolMetrics` - Counters and timings, snapshotted on demand

mod baseline;
pub mod classifier;
mod enforcer;
mod factory;
mod handle;
mod metrics;
pub mod pool;
pub mod retry;

#[cfg(test)]
mod testing;

pub use baseline::BaselineConfig;
pub use classifier::{
    ClassifierKind, EmptyClassifier, FailureClass, FailureClassifier, FatalClassifier,
    SqlStateClassifier,
};
pub use enforcer::StateEnforcer;
pub use factory::ConnectionFactory;
pub use handle::{ConnectionHandle, HandleId, HandleState};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{ConnectionPool, FlushMode, PoolConfig, PoolStats, PooledConnection};
pub use reservoir_core::{
    FailureRecord, IsolationLevel, RawConnection, ReservoirError, Result,
};
