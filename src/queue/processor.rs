// Queue processor: drains pending entries, persists them through the
// breaker-guarded database port, and settles each outcome against the
// retry bound. Multiple instances may run against the same queue; the
// atomic claim in queue::store keeps them from colliding.

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::db::port::{DatabasePort, ErrorClass, StoreError};
use crate::models::{AccountUpdate, QueueEntry, SwapEvent, SyncProgress, SWAP_ENTRY_TYPE};
use crate::queue::store;
use crate::status::SyncStatusTracker;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub batch_size: i64,
    pub poll_interval: Duration,
    pub lease_secs: i64,
    pub retry_base_secs: i64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            poll_interval: Duration::from_secs(1),
            lease_secs: 300,
            retry_base_secs: 5,
        }
    }
}

pub struct QueueProcessor {
    id: usize,
    pool: SqlitePool,
    db: Arc<dyn DatabasePort>,
    breaker: Arc<CircuitBreaker>,
    tracker: SyncStatusTracker,
    config: ProcessorConfig,
}

impl QueueProcessor {
    pub fn new(
        id: usize,
        pool: SqlitePool,
        db: Arc<dyn DatabasePort>,
        breaker: Arc<CircuitBreaker>,
        tracker: SyncStatusTracker,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            id,
            pool,
            db,
            breaker,
            tracker,
            config,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Queue processor {} started", self.id);

        if let Err(e) = self.tracker.start().await {
            error!("Queue processor {} failed to record start: {}", self.id, e);
        }

        let mut ticker = interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.process_available().await {
                        Ok(count) => {
                            if count > 0 {
                                debug!("Queue processor {} completed {} entries", self.id, count);
                            }
                        }
                        Err(e) => {
                            // Claim or status writes are failing; pause the
                            // lane and report rather than spin
                            error!("Queue processor {} pausing after store error: {}", self.id, e);
                            if let Err(err) = self.tracker.fail(&e.to_string()).await {
                                error!("Queue processor {} could not record failure: {}", self.id, err);
                            }
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Queue processor {} shutting down", self.id);
                    break;
                }
            }
        }
    }

    /// One drain cycle: reap expired leases, claim a batch, apply each entry.
    pub async fn process_available(&self) -> Result<usize, StoreError> {
        let reaped = store::reap_expired(&self.pool, self.config.lease_secs).await?;
        if reaped > 0 {
            warn!("Reclaimed {} expired queue claims", reaped);
        }

        let entries = store::claim_batch(&self.pool, self.config.batch_size).await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut completed = 0;
        for entry in entries {
            if self.process_entry(&entry).await? {
                completed += 1;
            }
        }

        Ok(completed)
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<bool, StoreError> {
        match self.apply(entry).await {
            Ok(()) => {
                if let Err(e) = store::mark_completed(&self.pool, entry.id).await {
                    // The lease reaper will re-deliver; the apply is idempotent
                    error!("Failed to mark queue entry {} completed: {}", entry.id, e);
                    return Ok(false);
                }
                self.tracker
                    .progress(SyncProgress {
                        slot: Some(entry.slot),
                        signature: entry.signature.clone(),
                        timestamp: Some(Utc::now().timestamp()),
                        accounts_delta: 1,
                    })
                    .await?;
                Ok(true)
            }
            Err(BreakerError::Open { name }) => {
                // Not attempted; no retry is spent
                debug!("Queue entry {} deferred, circuit [{}] open", entry.id, name);
                if let Err(e) =
                    store::release_unattempted(&self.pool, entry.id, self.config.retry_base_secs)
                        .await
                {
                    error!("Failed to release queue entry {}: {}", entry.id, e);
                }
                Ok(false)
            }
            Err(BreakerError::Inner(err)) => {
                self.settle_failure(entry, err).await;
                Ok(false)
            }
        }
    }

    async fn settle_failure(&self, entry: &QueueEntry, err: StoreError) {
        let message = err.to_string();
        match err.class() {
            ErrorClass::Permanent => {
                warn!("Queue entry {} failed permanently: {}", entry.id, message);
                if let Err(e) = store::mark_failed(&self.pool, entry.id, &message).await {
                    error!("Failed to mark queue entry {} failed: {}", entry.id, e);
                }
            }
            ErrorClass::Transient if entry.retry_count < entry.max_retries => {
                let delay = self.config.retry_base_secs << entry.retry_count.min(6);
                debug!(
                    "Queue entry {} scheduled for retry {}/{} in {}s: {}",
                    entry.id,
                    entry.retry_count + 1,
                    entry.max_retries,
                    delay,
                    message
                );
                if let Err(e) =
                    store::release_for_retry(&self.pool, entry.id, &message, delay).await
                {
                    error!("Failed to release queue entry {} for retry: {}", entry.id, e);
                }
            }
            ErrorClass::Transient => {
                warn!("Queue entry {} exhausted retries: {}", entry.id, message);
                if let Err(e) = store::mark_failed(&self.pool, entry.id, &message).await {
                    error!("Failed to mark queue entry {} failed: {}", entry.id, e);
                }
            }
        }
    }

    /// Decode and persist one entry through the breaker-guarded port. A
    /// payload that does not decode is permanent; it must not spend retries.
    async fn apply(&self, entry: &QueueEntry) -> Result<(), BreakerError<StoreError>> {
        if entry.account_type == SWAP_ENTRY_TYPE {
            let event: SwapEvent = serde_json::from_str(&entry.account_data)
                .map_err(|e| BreakerError::Inner(StoreError::Payload(e)))?;
            self.breaker
                .execute(|| async { self.db.upsert_swap(&event).await })
                .await
        } else {
            let data: serde_json::Value = serde_json::from_str(&entry.account_data)
                .map_err(|e| BreakerError::Inner(StoreError::Payload(e)))?;
            let update = AccountUpdate {
                pubkey: entry.account_pubkey.clone(),
                account_type: entry.account_type.clone(),
                data,
                event: entry.event_type,
                slot: entry.slot,
                signature: entry.signature.clone(),
            };
            self.breaker
                .execute(|| async { self.db.apply_account_update(&update).await })
                .await
        }
    }
}
