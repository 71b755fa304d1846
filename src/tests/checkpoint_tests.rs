use crate::db::memory::MemoryDatabase;
use crate::db::port::DatabasePort;
use crate::db::sqlite::SqliteDatabase;
use crate::models::{CheckpointUpdate, BACKFILL_LANE, REALTIME_LANE};
use crate::tests::support::{sample_event, setup_pool};
use sqlx::Row;

async fn setup_db() -> SqliteDatabase {
    SqliteDatabase::new(setup_pool().await)
}

#[tokio::test]
async fn upserting_the_same_signature_twice_stores_one_row() {
    let db = setup_db().await;
    let event = sample_event("sig_once", 42);

    db.upsert_swap(&event).await.unwrap();
    db.upsert_swap(&event).await.unwrap();

    let row = sqlx::query("SELECT COUNT(*) AS n, MAX(amount_in) AS amount FROM swaps")
        .fetch_one(db.pool())
        .await
        .unwrap();
    let count: i64 = row.get("n");
    let amount: String = row.get("amount");
    assert_eq!(count, 1);
    assert_eq!(amount, event.amount_in.to_string());
}

#[tokio::test]
async fn missing_lane_reads_none() {
    let db = setup_db().await;
    assert!(db.get_checkpoint(REALTIME_LANE).await.unwrap().is_none());
}

#[tokio::test]
async fn partial_update_preserves_the_other_field() {
    let db = setup_db().await;

    db.set_checkpoint(
        REALTIME_LANE,
        &CheckpointUpdate {
            last_slot: Some(100),
            last_signature: None,
        },
    )
    .await
    .unwrap();

    db.set_checkpoint(
        REALTIME_LANE,
        &CheckpointUpdate {
            last_slot: None,
            last_signature: Some("sigA".to_string()),
        },
    )
    .await
    .unwrap();

    let cp = db.get_checkpoint(REALTIME_LANE).await.unwrap().unwrap();
    assert_eq!(cp.last_slot, Some(100));
    assert_eq!(cp.last_signature, Some("sigA".to_string()));
}

#[tokio::test]
async fn slot_only_moves_forward() {
    let db = setup_db().await;

    for slot in [100, 150, 200] {
        db.set_checkpoint(
            BACKFILL_LANE,
            &CheckpointUpdate::position(slot, &format!("sig{slot}")),
        )
        .await
        .unwrap();
    }

    // A stale write must not regress the slot; the signature follows
    // last-writer-wins
    db.set_checkpoint(BACKFILL_LANE, &CheckpointUpdate::position(120, "sigLate"))
        .await
        .unwrap();

    let cp = db.get_checkpoint(BACKFILL_LANE).await.unwrap().unwrap();
    assert_eq!(cp.last_slot, Some(200));
    assert_eq!(cp.last_signature, Some("sigLate".to_string()));
}

#[tokio::test]
async fn lanes_are_independent() {
    let db = setup_db().await;

    db.set_checkpoint(REALTIME_LANE, &CheckpointUpdate::position(500, "sigR"))
        .await
        .unwrap();
    db.set_checkpoint(BACKFILL_LANE, &CheckpointUpdate::position(50, "sigB"))
        .await
        .unwrap();

    let realtime = db.get_checkpoint(REALTIME_LANE).await.unwrap().unwrap();
    let backfill = db.get_checkpoint(BACKFILL_LANE).await.unwrap().unwrap();
    assert_eq!(realtime.last_slot, Some(500));
    assert_eq!(backfill.last_slot, Some(50));
}

#[tokio::test]
async fn memory_double_matches_sqlite_semantics() {
    let db = MemoryDatabase::new();

    assert!(db.get_checkpoint(REALTIME_LANE).await.unwrap().is_none());

    db.set_checkpoint(REALTIME_LANE, &CheckpointUpdate::position(100, "sig100"))
        .await
        .unwrap();
    db.set_checkpoint(
        REALTIME_LANE,
        &CheckpointUpdate {
            last_slot: None,
            last_signature: Some("sigNext".to_string()),
        },
    )
    .await
    .unwrap();
    db.set_checkpoint(REALTIME_LANE, &CheckpointUpdate::position(80, "sigOld"))
        .await
        .unwrap();

    let cp = db.get_checkpoint(REALTIME_LANE).await.unwrap().unwrap();
    assert_eq!(cp.last_slot, Some(100));
    assert_eq!(cp.last_signature, Some("sigOld".to_string()));
}
