// The persistence abstraction every ingestion component writes through.
// Production implementation: db::sqlite. In-memory double for worker tests:
// db::memory.

use crate::models::{
    AccountUpdate, Checkpoint, CheckpointUpdate, NewQueueEntry, SwapEvent, SyncComponent,
    SyncProgress, SyncStatusRecord,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Retry-or-not decision for a failed store call. Kept as an explicit
/// function so the policy is testable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: connection loss, pool exhaustion, lock contention.
    Transient,
    /// Retrying cannot succeed: malformed data, constraint violation.
    Permanent,
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::Payload(_) => ErrorClass::Permanent,
            StoreError::Unavailable(_) => ErrorClass::Transient,
            StoreError::Database(e) => match e {
                sqlx::Error::Database(db) => {
                    // SQLITE_BUSY / SQLITE_LOCKED surface as database errors
                    // but clear up on retry; constraint violations do not.
                    let msg = db.message().to_lowercase();
                    if msg.contains("locked") || msg.contains("busy") {
                        ErrorClass::Transient
                    } else {
                        ErrorClass::Permanent
                    }
                }
                sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. }
                | sqlx::Error::ColumnNotFound(_) => ErrorClass::Permanent,
                _ => ErrorClass::Transient,
            },
        }
    }
}

#[async_trait]
pub trait DatabasePort: Send + Sync {
    /// Establish connectivity; startup fails fatally if this errors.
    async fn init(&self) -> Result<(), StoreError>;

    /// Cheap liveness probe for the health surface.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Idempotent insert keyed by signature; a duplicate is a no-op.
    async fn upsert_swap(&self, event: &SwapEvent) -> Result<(), StoreError>;

    /// Fold decoded account state, guarded so a lower-slot update never
    /// overwrites a higher-slot row for the same pubkey.
    async fn apply_account_update(&self, update: &AccountUpdate) -> Result<(), StoreError>;

    /// Stage a unit of work for the queue processor; returns the entry id.
    async fn enqueue(&self, entry: &NewQueueEntry) -> Result<i64, StoreError>;

    /// None means the lane never started; the caller picks its default.
    async fn get_checkpoint(&self, lane: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Partial-field upsert; the stored slot never moves backwards.
    async fn set_checkpoint(&self, lane: &str, update: &CheckpointUpdate)
        -> Result<(), StoreError>;

    async fn sync_started(&self, component: SyncComponent) -> Result<(), StoreError>;

    async fn sync_progress(
        &self,
        component: SyncComponent,
        progress: &SyncProgress,
    ) -> Result<(), StoreError>;

    async fn sync_completed(&self, component: SyncComponent) -> Result<(), StoreError>;

    async fn sync_failed(&self, component: SyncComponent, error: &str) -> Result<(), StoreError>;

    async fn get_sync_status(
        &self,
        component: SyncComponent,
    ) -> Result<Option<SyncStatusRecord>, StoreError>;

    async fn list_sync_status(&self) -> Result<Vec<SyncStatusRecord>, StoreError>;
}
