// In-memory DatabasePort double. Mirrors the sqlite adapter's semantics
// (idempotent swap insert, slot-guarded account fold, monotonic checkpoint
// merge) so the listener, backfill and processor can be exercised without a
// database. A fail counter lets tests inject persistence failures.

use crate::db::port::{DatabasePort, StoreError};
use crate::models::{
    AccountUpdate, Checkpoint, CheckpointUpdate, EventKind, NewQueueEntry, SwapEvent,
    SyncComponent, SyncProgress, SyncState, SyncStatusRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub account_type: String,
    pub data: serde_json::Value,
    pub last_event: EventKind,
    pub updated_slot: i64,
    pub last_signature: Option<String>,
    pub closed: bool,
}

#[derive(Default)]
struct Inner {
    swaps: HashMap<String, SwapEvent>,
    accounts: HashMap<String, StoredAccount>,
    checkpoints: HashMap<String, Checkpoint>,
    queue: Vec<(i64, NewQueueEntry)>,
    next_queue_id: i64,
    sync: HashMap<SyncComponent, SyncStatusRecord>,
    fail_upserts: u32,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` swap upserts fail with a transient store error.
    pub async fn set_fail_upserts(&self, n: u32) {
        self.inner.lock().await.fail_upserts = n;
    }

    pub async fn swap_count(&self) -> usize {
        self.inner.lock().await.swaps.len()
    }

    pub async fn get_swap(&self, signature: &str) -> Option<SwapEvent> {
        self.inner.lock().await.swaps.get(signature).cloned()
    }

    pub async fn get_account(&self, pubkey: &str) -> Option<StoredAccount> {
        self.inner.lock().await.accounts.get(pubkey).cloned()
    }

    pub async fn queued(&self) -> Vec<NewQueueEntry> {
        self.inner
            .lock()
            .await
            .queue
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }
}

fn blank_record(component: SyncComponent, status: SyncState, now: i64) -> SyncStatusRecord {
    SyncStatusRecord {
        component,
        last_processed_slot: None,
        last_processed_signature: None,
        last_processed_timestamp: None,
        accounts_processed: 0,
        status,
        error_message: None,
        started_at: None,
        completed_at: None,
        updated_at: now,
    }
}

#[async_trait]
impl DatabasePort for MemoryDatabase {
    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_swap(&self, event: &SwapEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_upserts > 0 {
            inner.fail_upserts -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        // Duplicate signature is a no-op, same as ON CONFLICT DO NOTHING
        inner
            .swaps
            .entry(event.signature.clone())
            .or_insert_with(|| event.clone());
        Ok(())
    }

    async fn apply_account_update(&self, update: &AccountUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        match inner.accounts.entry(update.pubkey.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                if update.slot < existing.updated_slot {
                    return Ok(());
                }
                existing.updated_slot = update.slot;
                existing.last_event = update.event;
                existing.last_signature = update.signature.clone();
                match update.event {
                    EventKind::Create | EventKind::Update => {
                        existing.account_type = update.account_type.clone();
                        existing.data = update.data.clone();
                    }
                    EventKind::Close => existing.closed = true,
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredAccount {
                    account_type: update.account_type.clone(),
                    data: update.data.clone(),
                    last_event: update.event,
                    updated_slot: update.slot,
                    last_signature: update.signature.clone(),
                    closed: matches!(update.event, EventKind::Close),
                });
            }
        }

        Ok(())
    }

    async fn enqueue(&self, entry: &NewQueueEntry) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_queue_id += 1;
        let id = inner.next_queue_id;
        inner.queue.push((id, entry.clone()));
        Ok(id)
    }

    async fn get_checkpoint(&self, lane: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.inner.lock().await.checkpoints.get(lane).cloned())
    }

    async fn set_checkpoint(
        &self,
        lane: &str,
        update: &CheckpointUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let cp = inner
            .checkpoints
            .entry(lane.to_string())
            .or_insert(Checkpoint {
                last_slot: None,
                last_signature: None,
            });

        if let Some(slot) = update.last_slot {
            if cp.last_slot.map_or(true, |current| slot > current) {
                cp.last_slot = Some(slot);
            }
        }
        if let Some(signature) = &update.last_signature {
            cp.last_signature = Some(signature.clone());
        }

        Ok(())
    }

    async fn sync_started(&self, component: SyncComponent) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.lock().await;
        let record = inner
            .sync
            .entry(component)
            .or_insert_with(|| blank_record(component, SyncState::Running, now));
        record.status = SyncState::Running;
        record.started_at = Some(now);
        record.completed_at = None;
        record.error_message = None;
        record.updated_at = now;
        Ok(())
    }

    async fn sync_progress(
        &self,
        component: SyncComponent,
        progress: &SyncProgress,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.lock().await;
        let record = inner
            .sync
            .entry(component)
            .or_insert_with(|| blank_record(component, SyncState::Running, now));
        if progress.slot.is_some() {
            record.last_processed_slot = progress.slot;
        }
        if progress.signature.is_some() {
            record.last_processed_signature = progress.signature.clone();
        }
        if progress.timestamp.is_some() {
            record.last_processed_timestamp = progress.timestamp;
        }
        record.accounts_processed += progress.accounts_delta;
        record.updated_at = now;
        Ok(())
    }

    async fn sync_completed(&self, component: SyncComponent) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.lock().await;
        let record = inner
            .sync
            .entry(component)
            .or_insert_with(|| blank_record(component, SyncState::Completed, now));
        record.status = SyncState::Completed;
        record.completed_at = Some(now);
        record.updated_at = now;
        Ok(())
    }

    async fn sync_failed(&self, component: SyncComponent, error: &str) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.lock().await;
        let record = inner
            .sync
            .entry(component)
            .or_insert_with(|| blank_record(component, SyncState::Failed, now));
        record.status = SyncState::Failed;
        record.error_message = Some(error.to_string());
        record.updated_at = now;
        Ok(())
    }

    async fn get_sync_status(
        &self,
        component: SyncComponent,
    ) -> Result<Option<SyncStatusRecord>, StoreError> {
        Ok(self.inner.lock().await.sync.get(&component).cloned())
    }

    async fn list_sync_status(&self) -> Result<Vec<SyncStatusRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner.sync.values().cloned().collect();
        records.sort_by_key(|r| r.component.as_str());
        Ok(records)
    }
}
