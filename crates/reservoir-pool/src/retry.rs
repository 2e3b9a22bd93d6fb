//! Retrying connection creation
//!
//! The pool reports a failed creation to the caller that needed it and
//! never retries on its own. Wrap a factory in [`RetryingFactory`] to retry
//! `create` with exponential backoff before giving up.
//!
//! # Example
//!
//! ```ignore
//! use reservoir_pool::retry::{BackoffStrategy, RetryConfig, RetryingFactory};
//!
//! let backoff = BackoffStrategy::new(100, 5_000).with_jitter(true);
//! let factory = RetryingFactory::new(my_factory, RetryConfig::new(3, backoff));
//! let pool = ConnectionPool::new(PoolConfig::default(), factory);
//! ```

mod backoff;
mod factory;


pub use backoff::BackoffStrategy;
pub use factory::{RetryConfig, RetryingFactory};
