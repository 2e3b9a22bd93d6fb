//! Connections handed out by the pool are always back at the baseline

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reservoir_pool::{
    BaselineConfig, ClassifierKind, ConnectionFactory, ConnectionPool, FailureRecord,
    IsolationLevel, PoolConfig, RawConnection, Result,
};

#[derive(Debug, Default)]
struct Session {
    isolation: i32,
    auto_commit: bool,
    warning: Option<FailureRecord>,
}

/// In-memory connection whose session is visible to the test
struct FakeConnection {
    session: Arc<Mutex<Session>>,
}

#[async_trait]
impl RawConnection for FakeConnection {
    async fn transaction_isolation(&mut self) -> Result<i32> {
        Ok(self.session.lock().isolation)
    }

    async fn set_transaction_isolation(&mut self, level: i32) -> Result<()> {
        self.session.lock().isolation = level;
        Ok(())
    }

    async fn auto_commit(&mut self) -> Result<bool> {
        Ok(self.session.lock().auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.session.lock().auto_commit = auto_commit;
        Ok(())
    }

    async fn warnings(&mut self) -> Result<Option<FailureRecord>> {
        Ok(self.session.lock().warning.clone())
    }

    async fn clear_warnings(&mut self) -> Result<()> {
        self.session.lock().warning = None;
        Ok(())
    }

    async fn execute(&mut self, _sql: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeFactory {
    sessions: Mutex<Vec<Arc<Mutex<Session>>>>,
    created: AtomicUsize,
}

impl FakeFactory {
    fn session(&self, index: usize) -> Arc<Mutex<Session>> {
        self.sessions.lock()[index].clone()
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn RawConnection>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        // Drivers commonly start in auto-commit at the server's default isolation
        let session = Arc::new(Mutex::new(Session {
            isolation: IsolationLevel::REPEATABLE_READ,
            auto_commit: true,
            warning: None,
        }));
        self.sessions.lock().push(session.clone());
        Ok(Box::new(FakeConnection { session }))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pool_with(baseline: BaselineConfig, classifier: ClassifierKind) -> (ConnectionPool, Arc<FakeFactory>) {
    init_tracing();
    let factory = Arc::new(FakeFactory::default());
    let config = PoolConfig::new(0, 1)
        .with_metrics_enabled(true)
        .with_classifier(classifier)
        .with_baseline(baseline);
    (ConnectionPool::new(config, factory.clone()), factory)
}

#[tokio::test]
async fn test_baseline_applied_to_new_connection() {
    let baseline = BaselineConfig::new()
        .with_isolation(IsolationLevel::Serializable)
        .with_auto_commit(false);
    let (pool, _factory) = pool_with(baseline, ClassifierKind::Empty);

    let mut conn = pool.get().await.unwrap();
    assert_eq!(
        conn.transaction_isolation().await.unwrap(),
        IsolationLevel::SERIALIZABLE
    );
    assert!(!conn.auto_commit().await.unwrap());
}

#[tokio::test]
async fn test_isolation_restored_after_each_level() {
    let baseline = BaselineConfig::new().with_isolation(IsolationLevel::ReadCommitted);
    let (pool, factory) = pool_with(baseline, ClassifierKind::Empty);

    for level in [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
        IsolationLevel::None,
    ] {
        let mut conn = pool.get().await.unwrap();
        conn.set_transaction_isolation(level.level()).await.unwrap();
        pool.release(conn, None).await.unwrap();

        let mut conn = pool.get().await.unwrap();
        assert_eq!(
            IsolationLevel::from_level(conn.transaction_isolation().await.unwrap()),
            IsolationLevel::ReadCommitted
        );
        pool.release(conn, None).await.unwrap();
    }
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_custom_isolation_baseline() {
    let baseline = BaselineConfig::new().with_isolation(IsolationLevel::Custom(42));
    let (pool, factory) = pool_with(baseline, ClassifierKind::Empty);

    let mut conn = pool.get().await.unwrap();
    assert_eq!(conn.transaction_isolation().await.unwrap(), 42);
    conn.set_transaction_isolation(IsolationLevel::READ_COMMITTED)
        .await
        .unwrap();
    drop(conn);

    let mut conn = pool.get().await.unwrap();
    assert_eq!(conn.transaction_isolation().await.unwrap(), 42);
    assert_eq!(factory.session(0).lock().isolation, 42);
}

#[tokio::test]
async fn test_auto_commit_restored() {
    let (pool, _factory) = pool_with(BaselineConfig::new(), ClassifierKind::Empty);

    let mut conn = pool.get().await.unwrap();
    conn.set_auto_commit(false).await.unwrap();
    pool.release(conn, None).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.auto_commit().await.unwrap());
}

#[tokio::test]
async fn test_warning_with_transient_failure_keeps_connection() {
    let (pool, factory) = pool_with(BaselineConfig::new(), ClassifierKind::Empty);

    let conn = pool.get().await.unwrap();
    let warning = FailureRecord::with_sql_state("01004", "string data, right truncation");
    factory.session(0).lock().warning = Some(warning.clone());
    pool.release(conn, Some(warning)).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.warnings().await.unwrap().is_none());
    assert_eq!(pool.metrics().creation_count, 1);
}

#[tokio::test]
async fn test_warning_with_fatal_failure_replaces_connection() {
    let (pool, factory) = pool_with(BaselineConfig::new(), ClassifierKind::Fatal);

    let conn = pool.get().await.unwrap();
    let warning = FailureRecord::with_sql_state("01004", "string data, right truncation");
    factory.session(0).lock().warning = Some(warning.clone());
    pool.release(conn, Some(warning)).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.warnings().await.unwrap().is_none());
    assert_eq!(pool.metrics().creation_count, 2);
}

#[tokio::test]
async fn test_pending_warning_classified_on_plain_release() {
    let (pool, factory) = pool_with(BaselineConfig::new(), ClassifierKind::Fatal);

    let conn = pool.get().await.unwrap();
    factory.session(0).lock().warning =
        Some(FailureRecord::with_sql_state("01004", "string data, right truncation"));
    pool.release(conn, None).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.warnings().await.unwrap().is_none());
    assert_eq!(pool.metrics().creation_count, 2);
}

#[tokio::test]
async fn test_pending_warning_kept_on_plain_release_with_empty_classifier() {
    let (pool, factory) = pool_with(BaselineConfig::new(), ClassifierKind::Empty);

    let conn = pool.get().await.unwrap();
    factory.session(0).lock().warning =
        Some(FailureRecord::with_sql_state("01004", "string data, right truncation"));
    pool.release(conn, None).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.warnings().await.unwrap().is_none());
    assert_eq!(pool.metrics().creation_count, 1);
}
