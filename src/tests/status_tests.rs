use crate::db::memory::MemoryDatabase;
use crate::db::port::DatabasePort;
use crate::db::sqlite::SqliteDatabase;
use crate::health::{HealthCheck, HealthStatus};
use crate::models::{SyncComponent, SyncProgress, SyncState};
use crate::status::SyncStatusTracker;
use crate::tests::support::setup_pool;
use std::sync::Arc;

#[tokio::test]
async fn tracker_records_the_component_lifecycle() {
    let db: Arc<dyn DatabasePort> = Arc::new(SqliteDatabase::new(setup_pool().await));
    let tracker = SyncStatusTracker::new(db.clone(), SyncComponent::HistoricalSync);

    tracker.start().await.unwrap();
    let record = tracker.current().await.unwrap().unwrap();
    assert_eq!(record.status, SyncState::Running);
    assert!(record.started_at.is_some());
    assert_eq!(record.accounts_processed, 0);

    tracker
        .progress(SyncProgress {
            slot: Some(10),
            signature: Some("sig10".to_string()),
            timestamp: Some(1_700_000_010),
            accounts_delta: 2,
        })
        .await
        .unwrap();
    tracker
        .progress(SyncProgress {
            slot: Some(20),
            signature: Some("sig20".to_string()),
            timestamp: Some(1_700_000_020),
            accounts_delta: 3,
        })
        .await
        .unwrap();

    let record = tracker.current().await.unwrap().unwrap();
    assert_eq!(record.last_processed_slot, Some(20));
    assert_eq!(record.last_processed_signature, Some("sig20".to_string()));
    assert_eq!(record.accounts_processed, 5);

    tracker.complete().await.unwrap();
    let record = tracker.current().await.unwrap().unwrap();
    assert_eq!(record.status, SyncState::Completed);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn tracker_failure_is_recorded_and_cleared_on_restart() {
    let db: Arc<dyn DatabasePort> = Arc::new(SqliteDatabase::new(setup_pool().await));
    let tracker = SyncStatusTracker::new(db.clone(), SyncComponent::LiveSync);

    tracker.start().await.unwrap();
    tracker.fail("subscription dropped").await.unwrap();

    let record = tracker.current().await.unwrap().unwrap();
    assert_eq!(record.status, SyncState::Failed);
    assert_eq!(record.error_message.as_deref(), Some("subscription dropped"));

    // Restarting the lane clears the previous terminal state
    tracker.start().await.unwrap();
    let record = tracker.current().await.unwrap().unwrap();
    assert_eq!(record.status, SyncState::Running);
    assert!(record.error_message.is_none());
    assert!(record.completed_at.is_none());
}

#[tokio::test]
async fn one_row_per_component() {
    let db: Arc<dyn DatabasePort> = Arc::new(SqliteDatabase::new(setup_pool().await));
    let tracker = SyncStatusTracker::new(db.clone(), SyncComponent::QueueProcessor);

    tracker.start().await.unwrap();
    tracker.start().await.unwrap();
    tracker.complete().await.unwrap();

    let records = db.list_sync_status().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].component, SyncComponent::QueueProcessor);
}

#[tokio::test]
async fn health_is_healthy_while_components_run() {
    let db = Arc::new(MemoryDatabase::new());
    let port: Arc<dyn DatabasePort> = db.clone();
    port.sync_started(SyncComponent::LiveSync).await.unwrap();
    port.sync_started(SyncComponent::QueueProcessor).await.unwrap();

    let health = HealthCheck::new(port);
    let report = health.check().await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.components.contains_key("live_sync"));
    assert!(report.components.contains_key("database"));
    assert_eq!(health.status().await, HealthStatus::Healthy);
}

#[tokio::test]
async fn any_failed_component_makes_the_system_unhealthy() {
    let db = Arc::new(MemoryDatabase::new());
    let port: Arc<dyn DatabasePort> = db.clone();
    port.sync_started(SyncComponent::LiveSync).await.unwrap();
    port.sync_failed(SyncComponent::HistoricalSync, "rpc timeout")
        .await
        .unwrap();

    let health = HealthCheck::new(port);
    let report = health.check().await;

    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(health.status().await, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn a_stopped_component_degrades_the_system() {
    let pool = setup_pool().await;
    let port: Arc<dyn DatabasePort> = Arc::new(SqliteDatabase::new(pool.clone()));
    port.sync_started(SyncComponent::LiveSync).await.unwrap();

    // Stopped lanes come from operator action, not the trackers
    sqlx::query(
        "INSERT INTO sync_status (component, status, updated_at) \
         VALUES ('gap_recovery', 'stopped', strftime('%s', 'now'))",
    )
    .execute(&pool)
    .await
    .unwrap();

    let health = HealthCheck::new(port);
    let report = health.check().await;

    assert_eq!(report.status, HealthStatus::Degraded);
}
