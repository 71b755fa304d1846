// Durable work queue over the processing_queue table. Claims are a single
// conditional UPDATE so that no two processors can take the same entry; a
// claim that never completes is reclaimed by the lease reaper.

use crate::models::{EventKind, NewQueueEntry, QueueEntry, QueueStats, QueueStatus};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

const QUEUE_COLUMNS: &str = "id, account_pubkey, account_type, account_data, event_type, slot, \
     signature, status, retry_count, max_retries, error_message, created_at, \
     processing_started_at, processed_at";

fn decode_err(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<QueueEntry, sqlx::Error> {
    let event_raw: String = row.get("event_type");
    let event_type = EventKind::parse(&event_raw)
        .ok_or_else(|| decode_err("event_type", format!("unknown event type {event_raw}")))?;
    let status_raw: String = row.get("status");
    let status = QueueStatus::parse(&status_raw)
        .ok_or_else(|| decode_err("status", format!("unknown status {status_raw}")))?;

    Ok(QueueEntry {
        id: row.get("id"),
        account_pubkey: row.get("account_pubkey"),
        account_type: row.get("account_type"),
        account_data: row.get("account_data"),
        event_type,
        slot: row.get("slot"),
        signature: row.get("signature"),
        status,
        retry_count: row.get("retry_count"),
        max_retries: row.get("max_retries"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        processing_started_at: row.get("processing_started_at"),
        processed_at: row.get("processed_at"),
    })
}

pub async fn enqueue(pool: &SqlitePool, entry: &NewQueueEntry) -> Result<i64, sqlx::Error> {
    let data = serde_json::to_string(&entry.account_data)
        .map_err(|e| decode_err("account_data", e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO processing_queue
        (account_pubkey, account_type, account_data, event_type, slot, signature, max_retries)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.account_pubkey)
    .bind(&entry.account_type)
    .bind(&data)
    .bind(entry.event_type.as_str())
    .bind(entry.slot)
    .bind(&entry.signature)
    .bind(entry.max_retries)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Atomically move up to `limit` due pending entries to `processing` and
/// return them. The conditional UPDATE is the compare-and-set: an entry
/// already claimed by another processor no longer matches `status =
/// 'pending'` and cannot be returned twice.
pub async fn claim_batch(pool: &SqlitePool, limit: i64) -> Result<Vec<QueueEntry>, sqlx::Error> {
    let now = Utc::now().timestamp();

    let sql = format!(
        r#"
        UPDATE processing_queue
        SET status = 'processing', processing_started_at = ?1
        WHERE id IN (
            SELECT id FROM processing_queue
            WHERE status = 'pending' AND next_attempt_at <= ?1
            ORDER BY slot, id
            LIMIT ?2
        )
        RETURNING {QUEUE_COLUMNS}
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        entries.push(row_to_entry(row)?);
    }

    Ok(entries)
}

pub async fn mark_completed(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE processing_queue SET status = 'completed', processed_at = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Return a claimed entry to `pending` after a transient failure, spending
/// one retry. `delay_secs` pushes the next attempt into the future.
pub async fn release_for_retry(
    pool: &SqlitePool,
    id: i64,
    error: &str,
    delay_secs: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE processing_queue
        SET status = 'pending',
            retry_count = retry_count + 1,
            error_message = ?,
            processing_started_at = NULL,
            next_attempt_at = ?
        WHERE id = ? AND status = 'processing'
        "#,
    )
    .bind(error)
    .bind(Utc::now().timestamp() + delay_secs)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Return a claimed entry to `pending` without spending a retry. Used when
/// the circuit breaker rejected the call before it was attempted.
pub async fn release_unattempted(
    pool: &SqlitePool,
    id: i64,
    delay_secs: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE processing_queue
        SET status = 'pending',
            processing_started_at = NULL,
            next_attempt_at = ?
        WHERE id = ? AND status = 'processing'
        "#,
    )
    .bind(Utc::now().timestamp() + delay_secs)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Terminal failure. The entry is kept for audit and never retried again.
pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE processing_queue SET status = 'failed', error_message = ?, processed_at = ? \
         WHERE id = ?",
    )
    .bind(error)
    .bind(Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Reclaim entries whose claim outlived the lease. A reaped claim counts as
/// a spent attempt; entries already at the retry bound become `failed` so a
/// crash-looping entry cannot be reclaimed forever.
pub async fn reap_expired(pool: &SqlitePool, lease_secs: i64) -> Result<u64, sqlx::Error> {
    let now = Utc::now().timestamp();
    let cutoff = now - lease_secs;

    let failed = sqlx::query(
        r#"
        UPDATE processing_queue
        SET status = 'failed',
            error_message = 'claim lease expired',
            processed_at = ?1
        WHERE status = 'processing'
          AND processing_started_at IS NOT NULL
          AND processing_started_at <= ?2
          AND retry_count >= max_retries
        "#,
    )
    .bind(now)
    .bind(cutoff)
    .execute(pool)
    .await?;

    let reclaimed = sqlx::query(
        r#"
        UPDATE processing_queue
        SET status = 'pending',
            retry_count = retry_count + 1,
            error_message = 'claim lease expired',
            processing_started_at = NULL,
            next_attempt_at = ?1
        WHERE status = 'processing'
          AND processing_started_at IS NOT NULL
          AND processing_started_at <= ?2
        "#,
    )
    .bind(now)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(failed.rows_affected() + reclaimed.rows_affected())
}

pub async fn counts_by_status(pool: &SqlitePool) -> Result<QueueStats, sqlx::Error> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM processing_queue GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut stats = QueueStats::default();
    for row in rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        match status.as_str() {
            "pending" => stats.pending = n,
            "processing" => stats.processing = n,
            "completed" => stats.completed = n,
            "failed" => stats.failed = n,
            _ => {}
        }
    }

    Ok(stats)
}

pub async fn get_entry(pool: &SqlitePool, id: i64) -> Result<Option<QueueEntry>, sqlx::Error> {
    let sql = format!("SELECT {QUEUE_COLUMNS} FROM processing_queue WHERE id = ?");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;

    match row {
        Some(row) => Ok(Some(row_to_entry(&row)?)),
        None => Ok(None),
    }
}
