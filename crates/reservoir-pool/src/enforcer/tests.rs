//! Tests for baseline enforcement

use std::sync::Arc;

use parking_lot::Mutex;
use reservoir_core::{FailureRecord, IsolationLevel};
use uuid::Uuid;

use super::StateEnforcer;
use crate::baseline::BaselineConfig;
use crate::handle::{ConnectionHandle, HandleId, HandleState};
use crate::testing::{MockConnection, MockState, SharedState};

fn handle_with(state: MockState) -> (ConnectionHandle, SharedState) {
    let shared = Arc::new(Mutex::new(state));
    let handle = ConnectionHandle::new(
        HandleId::new(1),
        Uuid::new_v4(),
        Box::new(MockConnection::new(shared.clone())),
        0,
    );
    (handle, shared)
}

async fn ready_handle(enforcer: &StateEnforcer, state: MockState) -> (ConnectionHandle, SharedState) {
    let (mut handle, shared) = handle_with(state);
    enforcer.initialize(&mut handle).await.expect("initialize");
    handle.transition(HandleState::CheckedOut);
    (handle, shared)
}

#[tokio::test]
async fn test_initialize_applies_baseline() {
    let enforcer = StateEnforcer::new(
        BaselineConfig::new()
            .with_isolation(IsolationLevel::Serializable)
            .with_auto_commit(false)
            .with_schema("app")
            .with_init_sql("SET TIME ZONE 'UTC'"),
    );
    let (mut handle, shared) = handle_with(MockState::default());
    assert_eq!(handle.state(), HandleState::New);

    enforcer.initialize(&mut handle).await.expect("initialize");

    let state = shared.lock();
    assert_eq!(state.isolation, 8);
    assert!(!state.auto_commit);
    assert_eq!(state.schema.as_deref(), Some("app"));
    assert_eq!(state.executed, vec!["SET TIME ZONE 'UTC'".to_string()]);
    assert_eq!(handle.state(), HandleState::Idle);
    assert!(!handle.is_dirty());
}

#[tokio::test]
async fn test_initialize_skips_matching_attributes() {
    // Mock defaults: READ_COMMITTED, auto-commit on, read-write
    let enforcer = StateEnforcer::new(
        BaselineConfig::new().with_isolation(IsolationLevel::ReadCommitted),
    );
    let (mut handle, shared) = handle_with(MockState::default());
    enforcer.initialize(&mut handle).await.expect("initialize");

    assert_eq!(shared.lock().writes, 0);
    assert_eq!(enforcer.writes_issued(), 0);
}

#[tokio::test]
async fn test_clean_checkout_is_write_free() {
    let enforcer = StateEnforcer::new(
        BaselineConfig::new().with_isolation(IsolationLevel::RepeatableRead),
    );
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;
    let writes_after_init = shared.lock().writes;
    let counted_after_init = enforcer.writes_issued();

    enforcer.checkout(&mut handle).await.expect("first checkout");
    enforcer.checkout(&mut handle).await.expect("second checkout");

    assert_eq!(shared.lock().writes, writes_after_init);
    assert_eq!(enforcer.writes_issued(), counted_after_init);
}

#[tokio::test]
async fn test_checkin_only_marks_dirty() {
    let enforcer = StateEnforcer::new(BaselineConfig::new().with_isolation(4));
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;

    handle.raw_mut().set_transaction_isolation(0).await.expect("set");
    let writes = shared.lock().writes;

    enforcer.checkin(&mut handle);

    assert!(handle.is_dirty());
    // Reconciliation is deferred to the next checkout
    assert_eq!(shared.lock().isolation, 0);
    assert_eq!(shared.lock().writes, writes);
}

#[tokio::test]
async fn test_dirty_checkout_restores_baseline() {
    let enforcer = StateEnforcer::new(
        BaselineConfig::new()
            .with_isolation(IsolationLevel::RepeatableRead)
            .with_auto_commit(false)
            .with_read_only(true)
            .with_catalog("main"),
    );
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;

    let raw = handle.raw_mut();
    raw.set_transaction_isolation(0).await.expect("set isolation");
    raw.set_auto_commit(true).await.expect("set auto-commit");
    raw.set_read_only(false).await.expect("set read-only");
    raw.set_catalog("scratch").await.expect("set catalog");
    enforcer.checkin(&mut handle);

    enforcer.checkout(&mut handle).await.expect("checkout");

    let state = shared.lock();
    assert_eq!(state.isolation, 4);
    assert!(!state.auto_commit);
    assert!(state.read_only);
    assert_eq!(state.catalog.as_deref(), Some("main"));
    assert!(!handle.is_dirty());
}

#[tokio::test]
async fn test_dirty_checkout_without_changes_only_reads() {
    let enforcer = StateEnforcer::new(BaselineConfig::new().with_isolation(2));
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;
    let writes = shared.lock().writes;

    enforcer.checkin(&mut handle);
    enforcer.checkout(&mut handle).await.expect("checkout");

    assert_eq!(shared.lock().writes, writes);
}

#[tokio::test]
async fn test_custom_isolation_level() {
    let enforcer = StateEnforcer::new(BaselineConfig::new().with_isolation(42));
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;
    assert_eq!(shared.lock().isolation, 42);

    handle
        .raw_mut()
        .set_transaction_isolation(IsolationLevel::Serializable.level())
        .await
        .expect("set");
    enforcer.checkin(&mut handle);
    enforcer.checkout(&mut handle).await.expect("checkout");

    assert_eq!(shared.lock().isolation, 42);
}

#[tokio::test]
async fn test_warnings_cleared_regardless_of_dirty_flag() {
    let enforcer = StateEnforcer::new(BaselineConfig::new());
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;
    assert!(!handle.is_dirty());

    shared.lock().warning = Some(FailureRecord::new("SQL Warning"));
    enforcer.checkout(&mut handle).await.expect("checkout");

    assert!(shared.lock().warning.is_none());
    assert!(handle.raw_mut().warnings().await.expect("warnings").is_none());
}

#[tokio::test]
async fn test_enforcement_error_propagates() {
    let enforcer = StateEnforcer::new(BaselineConfig::new().with_auto_commit(false));
    let (mut handle, shared) = ready_handle(&enforcer, MockState::default()).await;

    shared.lock().auto_commit = true;
    shared.lock().fail_writes = true;
    enforcer.checkin(&mut handle);

    assert!(enforcer.checkout(&mut handle).await.is_err());
    assert!(handle.is_dirty());
}

#[tokio::test]
async fn test_unsupported_attribute_fails_initialize() {
    struct Bare;

    #[async_trait::async_trait]
    impl reservoir_core::RawConnection for Bare {
        async fn transaction_isolation(&mut self) -> reservoir_core::Result<i32> {
            Ok(0)
        }
        async fn set_transaction_isolation(&mut self, _level: i32) -> reservoir_core::Result<()> {
            Ok(())
        }
        async fn auto_commit(&mut self) -> reservoir_core::Result<bool> {
            Ok(true)
        }
        async fn set_auto_commit(&mut self, _auto_commit: bool) -> reservoir_core::Result<()> {
            Ok(())
        }
        async fn warnings(&mut self) -> reservoir_core::Result<Option<FailureRecord>> {
            Ok(None)
        }
        async fn clear_warnings(&mut self) -> reservoir_core::Result<()> {
            Ok(())
        }
        async fn execute(&mut self, _sql: &str) -> reservoir_core::Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> reservoir_core::Result<()> {
            Ok(())
        }
    }

    let enforcer = StateEnforcer::new(BaselineConfig::new().with_schema("app"));
    let mut handle = ConnectionHandle::new(HandleId::new(7), Uuid::new_v4(), Box::new(Bare), 0);
    let err = enforcer.initialize(&mut handle).await.expect_err("schema unsupported");
    assert!(err.to_string().contains("Not supported"));
}
