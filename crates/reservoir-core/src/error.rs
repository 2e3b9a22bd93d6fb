//! Error types for reservoir

use std::time::Duration;

use thiserror::Error;

/// Core error type for pool and connection operations
#[derive(Error, Debug)]
pub enum ReservoirError {
    /// The connection factory could not produce a connection
    #[error("Connection creation failed: {0}")]
    Creation(String),

    /// No connection became available before the caller's deadline
    #[error("Timed out waiting for connection (timeout: {0:?})")]
    AcquireTimeout(Duration),

    /// The pool is shutting down or has shut down
    #[error("Pool is shut down")]
    PoolShutdown,

    /// The caller used the pool API incorrectly
    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReservoirError {
    /// Whether this error was caused by the caller rather than the pool or backend.
    pub fn is_misuse(&self) -> bool {
        matches!(self, ReservoirError::ProtocolMisuse(_))
    }
}

/// Result type alias for reservoir operations
pub type Result<T> = std::result::Result<T, ReservoirError>;
