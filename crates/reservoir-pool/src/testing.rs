//! Mock connections and factories shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reservoir_core::{FailureRecord, RawConnection, ReservoirError, Result};

use crate::factory::ConnectionFactory;

/// Observable state of one mock connection
#[derive(Debug, Clone)]
pub(crate) struct MockState {
    pub isolation: i32,
    pub auto_commit: bool,
    pub read_only: bool,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub warning: Option<FailureRecord>,
    pub executed: Vec<String>,
    /// Attribute setters and warning clears received
    pub writes: usize,
    pub closed: bool,
    pub valid: bool,
    pub fail_writes: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            isolation: 2,
            auto_commit: true,
            read_only: false,
            catalog: None,
            schema: None,
            warning: None,
            executed: Vec::new(),
            writes: 0,
            closed: false,
            valid: true,
            fail_writes: false,
        }
    }
}

pub(crate) type SharedState = Arc<Mutex<MockState>>;

pub(crate) struct MockConnection {
    state: SharedState,
}

impl MockConnection {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn write(&self) -> Result<parking_lot::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(ReservoirError::Connection("write rejected".into()));
        }
        state.writes += 1;
        Ok(state)
    }
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn transaction_isolation(&mut self) -> Result<i32> {
        Ok(self.state.lock().isolation)
    }

    async fn set_transaction_isolation(&mut self, level: i32) -> Result<()> {
        self.write()?.isolation = level;
        Ok(())
    }

    async fn auto_commit(&mut self) -> Result<bool> {
        Ok(self.state.lock().auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.write()?.auto_commit = auto_commit;
        Ok(())
    }

    async fn warnings(&mut self) -> Result<Option<FailureRecord>> {
        Ok(self.state.lock().warning.clone())
    }

    async fn clear_warnings(&mut self) -> Result<()> {
        self.write()?.warning = None;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.state.lock().executed.push(sql.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    async fn is_valid(&mut self) -> Result<bool> {
        Ok(self.state.lock().valid)
    }

    async fn read_only(&mut self) -> Result<bool> {
        Ok(self.state.lock().read_only)
    }

    async fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.write()?.read_only = read_only;
        Ok(())
    }

    async fn catalog(&mut self) -> Result<Option<String>> {
        Ok(self.state.lock().catalog.clone())
    }

    async fn set_catalog(&mut self, catalog: &str) -> Result<()> {
        self.write()?.catalog = Some(catalog.to_string());
        Ok(())
    }

    async fn schema(&mut self) -> Result<Option<String>> {
        Ok(self.state.lock().schema.clone())
    }

    async fn set_schema(&mut self, schema: &str) -> Result<()> {
        self.write()?.schema = Some(schema.to_string());
        Ok(())
    }
}

/// Factory that records every connection it creates
pub(crate) struct MockFactory {
    template: MockState,
    connections: Mutex<Vec<SharedState>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::with_template(MockState::default())
    }

    pub fn with_template(template: MockState) -> Self {
        Self {
            template,
            connections: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Connections successfully created
    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Calls to `create`, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn state(&self, index: usize) -> SharedState {
        self.connections.lock()[index].clone()
    }

    pub fn closed_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|state| state.lock().closed)
            .count()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self) -> Result<Box<dyn RawConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReservoirError::Connection("connection refused".into()));
        }
        let state = Arc::new(Mutex::new(self.template.clone()));
        self.connections.lock().push(state.clone());
        Ok(Box::new(MockConnection::new(state)))
    }
}
