//! Baseline connection attributes

use std::time::Duration;

use reservoir_core::IsolationLevel;
use serde::{Deserialize, Serialize};

/// The attributes every connection handed out by the pool must exhibit.
///
/// Fixed when the pool is built. Whatever a caller does to a connection
/// while holding it, the next caller sees these values again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Transaction isolation; `None` keeps the driver default and is not enforced
    isolation: Option<IsolationLevel>,
    auto_commit: bool,
    read_only: bool,
    catalog: Option<String>,
    schema: Option<String>,
    /// Statements executed once, in order, on every new connection
    init_sql: Vec<String>,
    /// Upper bound on how long the factory may take to open a connection
    login_timeout_ms: Option<u64>,
}

impl BaselineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isolation(mut self, isolation: impl Into<IsolationLevel>) -> Self {
        self.isolation = Some(isolation.into());
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Append a statement to run on each new connection
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql.push(sql.into());
        self
    }

    pub fn with_login_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.login_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn init_sql(&self) -> &[String] {
        &self.init_sql
    }

    pub fn login_timeout(&self) -> Option<Duration> {
        self.login_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for BaselineConfig {
    /// Driver-default isolation, auto-commit on, read-write, no catalog/schema
    fn default() -> Self {
        Self {
            isolation: None,
            auto_commit: true,
            read_only: false,
            catalog: None,
            schema: None,
            init_sql: Vec::new(),
            login_timeout_ms: None,
        }
    }
}
