// Production DatabasePort backed by the SQLite pool. All statements are
// runtime-bound; conflict targets carry the idempotency and ordering rules
// so the adapter works under concurrent workers without extra locking.

use crate::db::port::{DatabasePort, StoreError};
use crate::models::{
    AccountUpdate, Checkpoint, CheckpointUpdate, EventKind, NewQueueEntry, SwapEvent,
    SyncComponent, SyncProgress, SyncState, SyncStatusRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_err(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

fn row_to_sync_status(row: &sqlx::sqlite::SqliteRow) -> Result<SyncStatusRecord, sqlx::Error> {
    let component_raw: String = row.get("component");
    let component = SyncComponent::parse(&component_raw)
        .ok_or_else(|| decode_err("component", format!("unknown component {component_raw}")))?;
    let status_raw: String = row.get("status");
    let status = SyncState::parse(&status_raw)
        .ok_or_else(|| decode_err("status", format!("unknown status {status_raw}")))?;

    Ok(SyncStatusRecord {
        component,
        last_processed_slot: row.get("last_processed_slot"),
        last_processed_signature: row.get("last_processed_signature"),
        last_processed_timestamp: row.get("last_processed_timestamp"),
        accounts_processed: row.get("accounts_processed"),
        status,
        error_message: row.get("error_message"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl DatabasePort for SqliteDatabase {
    async fn init(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_swap(&self, event: &SwapEvent) -> Result<(), StoreError> {
        let raw = match &event.raw {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO swaps
            (signature, user_pubkey, token_in, token_out, amount_in, amount_out, slot, block_time, route, raw)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(signature) DO NOTHING
            "#,
        )
        .bind(&event.signature)
        .bind(&event.user_pubkey)
        .bind(&event.token_in)
        .bind(&event.token_out)
        .bind(event.amount_in.to_string())
        .bind(event.amount_out.to_string())
        .bind(event.slot)
        .bind(event.block_time)
        .bind(&event.route)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_account_update(&self, update: &AccountUpdate) -> Result<(), StoreError> {
        let data = serde_json::to_string(&update.data)?;

        match update.event {
            EventKind::Create | EventKind::Update => {
                sqlx::query(
                    r#"
                    INSERT INTO tracked_accounts
                    (pubkey, account_type, data, last_event, updated_slot, last_signature)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(pubkey) DO UPDATE SET
                        account_type = excluded.account_type,
                        data = excluded.data,
                        last_event = excluded.last_event,
                        updated_slot = excluded.updated_slot,
                        last_signature = excluded.last_signature,
                        updated_at = strftime('%s', 'now')
                    WHERE excluded.updated_slot >= tracked_accounts.updated_slot
                    "#,
                )
                .bind(&update.pubkey)
                .bind(&update.account_type)
                .bind(&data)
                .bind(update.event.as_str())
                .bind(update.slot)
                .bind(&update.signature)
                .execute(&self.pool)
                .await?;
            }
            EventKind::Close => {
                // A close keeps the last known data and only flips the flag,
                // still under the slot guard.
                sqlx::query(
                    r#"
                    INSERT INTO tracked_accounts
                    (pubkey, account_type, data, last_event, updated_slot, last_signature, closed)
                    VALUES (?, ?, ?, ?, ?, ?, 1)
                    ON CONFLICT(pubkey) DO UPDATE SET
                        closed = 1,
                        last_event = excluded.last_event,
                        updated_slot = excluded.updated_slot,
                        last_signature = excluded.last_signature,
                        updated_at = strftime('%s', 'now')
                    WHERE excluded.updated_slot >= tracked_accounts.updated_slot
                    "#,
                )
                .bind(&update.pubkey)
                .bind(&update.account_type)
                .bind(&data)
                .bind(update.event.as_str())
                .bind(update.slot)
                .bind(&update.signature)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    async fn enqueue(&self, entry: &NewQueueEntry) -> Result<i64, StoreError> {
        let id = crate::queue::store::enqueue(&self.pool, entry).await?;
        Ok(id)
    }

    async fn get_checkpoint(&self, lane: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query("SELECT last_slot, last_signature FROM checkpoints WHERE id = ?")
            .bind(lane)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Checkpoint {
            last_slot: row.get("last_slot"),
            last_signature: row.get("last_signature"),
        }))
    }

    async fn set_checkpoint(
        &self,
        lane: &str,
        update: &CheckpointUpdate,
    ) -> Result<(), StoreError> {
        // COALESCE merge for the signature, monotonic guard for the slot: a
        // write carrying an older slot keeps the stored value.
        sqlx::query(
            r#"
            INSERT INTO checkpoints (id, last_slot, last_signature)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                last_slot = CASE
                    WHEN ?2 IS NULL THEN checkpoints.last_slot
                    WHEN checkpoints.last_slot IS NULL OR ?2 > checkpoints.last_slot THEN ?2
                    ELSE checkpoints.last_slot
                END,
                last_signature = COALESCE(?3, checkpoints.last_signature),
                updated_at = strftime('%s', 'now')
            "#,
        )
        .bind(lane)
        .bind(update.last_slot)
        .bind(&update.last_signature)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sync_started(&self, component: SyncComponent) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sync_status (component, status, started_at, updated_at)
            VALUES (?1, 'running', ?2, ?2)
            ON CONFLICT(component) DO UPDATE SET
                status = 'running',
                started_at = ?2,
                completed_at = NULL,
                error_message = NULL,
                updated_at = ?2
            "#,
        )
        .bind(component.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sync_progress(
        &self,
        component: SyncComponent,
        progress: &SyncProgress,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sync_status
            (component, status, last_processed_slot, last_processed_signature,
             last_processed_timestamp, accounts_processed, updated_at)
            VALUES (?1, 'running', ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(component) DO UPDATE SET
                last_processed_slot = COALESCE(?2, sync_status.last_processed_slot),
                last_processed_signature = COALESCE(?3, sync_status.last_processed_signature),
                last_processed_timestamp = COALESCE(?4, sync_status.last_processed_timestamp),
                accounts_processed = sync_status.accounts_processed + ?5,
                updated_at = ?6
            "#,
        )
        .bind(component.as_str())
        .bind(progress.slot)
        .bind(&progress.signature)
        .bind(progress.timestamp)
        .bind(progress.accounts_delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sync_completed(&self, component: SyncComponent) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sync_status (component, status, completed_at, updated_at)
            VALUES (?1, 'completed', ?2, ?2)
            ON CONFLICT(component) DO UPDATE SET
                status = 'completed',
                completed_at = ?2,
                updated_at = ?2
            "#,
        )
        .bind(component.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sync_failed(&self, component: SyncComponent, error: &str) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sync_status (component, status, error_message, updated_at)
            VALUES (?1, 'failed', ?2, ?3)
            ON CONFLICT(component) DO UPDATE SET
                status = 'failed',
                error_message = ?2,
                updated_at = ?3
            "#,
        )
        .bind(component.as_str())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_sync_status(
        &self,
        component: SyncComponent,
    ) -> Result<Option<SyncStatusRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_status WHERE component = ?")
            .bind(component.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_sync_status(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_sync_status(&self) -> Result<Vec<SyncStatusRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sync_status ORDER BY component")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(row_to_sync_status(row)?);
        }

        Ok(records)
    }
}
