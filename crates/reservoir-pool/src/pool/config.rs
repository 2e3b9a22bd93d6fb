//! Pool configuration types

use std::time::Duration;

use reservoir_core::{ReservoirError, Result};
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineConfig;
use crate::classifier::ClassifierKind;

/// Configuration for a connection pool
///
/// Controls pool sizing, timeouts, background housekeeping and the baseline
/// every lent connection is reset to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of connections to maintain in the pool
    min_size: usize,
    /// Maximum number of connections allowed in the pool
    max_size: usize,
    /// Connections opened in the background when the pool starts
    #[serde(default)]
    initial_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds before it's recycled
    #[serde(default)]
    max_lifetime_ms: Option<u64>,
    /// A checkout held longer than this is reported as a leak
    #[serde(default)]
    leak_timeout_ms: Option<u64>,
    /// Idle connections are revalidated in the background this often
    #[serde(default)]
    validation_interval_ms: Option<u64>,
    /// Idle connections unvalidated for this long are validated before checkout
    #[serde(default)]
    idle_validation_ms: Option<u64>,
    /// Period of the background housekeeping task
    #[serde(default = "default_housekeeping_interval_ms")]
    housekeeping_interval_ms: u64,
    /// How long shutdown waits for checked-out connections to come back
    #[serde(default)]
    shutdown_grace_ms: u64,
    #[serde(default)]
    metrics_enabled: bool,
    #[serde(default)]
    classifier: ClassifierKind,
    #[serde(default)]
    baseline: BaselineConfig,
}

fn default_housekeeping_interval_ms() -> u64 {
    1_000
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            initial_size: min_size,
            acquire_timeout_ms: 30_000, // 30 seconds default
            idle_timeout_ms: 600_000,   // 10 minutes default
            max_lifetime_ms: None,
            leak_timeout_ms: None,
            validation_interval_ms: None,
            idle_validation_ms: None,
            housekeeping_interval_ms: default_housekeeping_interval_ms(),
            shutdown_grace_ms: 0,
            metrics_enabled: false,
            classifier: ClassifierKind::default(),
            baseline: BaselineConfig::default(),
        }
    }

    /// Check a (possibly deserialized) configuration for impossible values
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ReservoirError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(ReservoirError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.housekeeping_interval_ms == 0 {
            return Err(ReservoirError::Configuration(
                "housekeeping_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Set the number of connections opened at startup (clamped to `[min, max]`)
    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum connection lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn with_leak_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.leak_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_validation_interval_ms(mut self, interval_ms: u64) -> Self {
        self.validation_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_idle_validation_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_validation_ms = Some(timeout_ms);
        self
    }

    pub fn with_housekeeping_interval_ms(mut self, interval_ms: u64) -> Self {
        self.housekeeping_interval_ms = interval_ms.max(1);
        self
    }

    pub fn with_shutdown_grace_ms(mut self, grace_ms: u64) -> Self {
        self.shutdown_grace_ms = grace_ms;
        self
    }

    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Select one of the built-in failure classifiers
    pub fn with_classifier(mut self, classifier: ClassifierKind) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineConfig) -> Self {
        self.baseline = baseline;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Connections opened at startup, clamped to `[min_size, max_size]`
    pub fn initial_size(&self) -> usize {
        self.initial_size.clamp(self.min_size, self.max_size)
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the maximum lifetime as a Duration if set
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn leak_timeout(&self) -> Option<Duration> {
        self.leak_timeout_ms.map(Duration::from_millis)
    }

    pub fn validation_interval(&self) -> Option<Duration> {
        self.validation_interval_ms.map(Duration::from_millis)
    }

    pub fn idle_validation(&self) -> Option<Duration> {
        self.idle_validation_ms.map(Duration::from_millis)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    pub fn classifier(&self) -> ClassifierKind {
        self.classifier
    }

    pub fn baseline(&self) -> &BaselineConfig {
        &self.baseline
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 10 minutes
    /// - max_lifetime: None
    /// - classifier: empty
    fn default() -> Self {
        Self::new(1, 10)
    }
}
