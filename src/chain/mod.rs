pub mod backfill;
pub mod listener;
pub mod parser;
pub mod rpc;
pub mod source;

// Re-exports for convenience
pub use backfill::BackfillWorker;
pub use listener::RealtimeListener;
pub use parser::{JsonSwapParser, SwapParser};
pub use rpc::RpcSource;
pub use source::{RawTransaction, SignatureInfo, SourceError, TransactionSource};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::db::port::{DatabasePort, ErrorClass, StoreError};
use crate::models::{NewQueueEntry, SwapEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// How a producer hands events to persistence: straight through the port,
/// or staged on the processing queue for the queue processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    Direct,
    Queue,
}

impl PersistMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(PersistMode::Direct),
            "queue" => Some(PersistMode::Queue),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("circuit [{0}] open, deferring")]
    CircuitOpen(String),

    #[error("checkpoint write failed: {0}")]
    Checkpoint(StoreError),

    #[error("sync status write failed: {0}")]
    Status(StoreError),
}

/// Persist one parsed event through the breaker-guarded port. Returns false
/// when the event was dropped on a permanent error; transient failures and
/// open-circuit rejections bubble up so the caller stops the batch without
/// advancing its checkpoint.
pub(crate) async fn persist_swap_event(
    db: &Arc<dyn DatabasePort>,
    breaker: &CircuitBreaker,
    mode: PersistMode,
    max_retries: i64,
    event: &SwapEvent,
) -> Result<bool, WorkerError> {
    let result = match mode {
        PersistMode::Direct => breaker.execute(|| async { db.upsert_swap(event).await }).await,
        PersistMode::Queue => {
            let entry = NewQueueEntry::for_swap(event, max_retries).map_err(StoreError::Payload)?;
            breaker
                .execute(|| async { db.enqueue(&entry).await.map(|_| ()) })
                .await
        }
    };

    match result {
        Ok(()) => Ok(true),
        Err(BreakerError::Open { name }) => Err(WorkerError::CircuitOpen(name)),
        Err(BreakerError::Inner(err)) => match err.class() {
            ErrorClass::Permanent => {
                warn!("Dropping unpersistable event {}: {}", event.signature, err);
                Ok(false)
            }
            ErrorClass::Transient => Err(WorkerError::Store(err)),
        },
    }
}
