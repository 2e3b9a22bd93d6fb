//! Reservoir Core - Shared abstractions for the connection pool
//!
//! This crate defines the pieces every other reservoir crate depends on:
//!
//! - `RawConnection` - Trait for the physical connections a pool lends out
//! - `IsolationLevel` - Transaction isolation, named or vendor-specific
//! - `FailureRecord` - An error or warning observed on a raw connection
//! - `ReservoirError` - The error taxonomy and `Result` alias

mod connection;
mod error;
mod failure;
mod isolation;

pub use connection::*;
pub use error::*;
pub use failure::*;
pub use isolation::*;
