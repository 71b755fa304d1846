// Realtime lane: tails the signature stream for the tracked program from
// the last confirmed checkpoint, parses each new transaction, and advances
// the `realtime` checkpoint only after the durable write. A dropped or
// failed pass resumes from the checkpoint on the next tick, so reconnect
// gaps fall to the backfill lane rather than to this one.

use crate::breaker::CircuitBreaker;
use crate::chain::parser::SwapParser;
use crate::chain::source::{SignatureInfo, TransactionSource};
use crate::chain::{persist_swap_event, PersistMode, WorkerError};
use crate::db::port::DatabasePort;
use crate::models::{CheckpointUpdate, SyncProgress, REALTIME_LANE};
use crate::status::SyncStatusTracker;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub poll_interval: Duration,
    pub page_limit: usize,
    pub persist_mode: PersistMode,
    pub max_retries: i64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            page_limit: 100,
            persist_mode: PersistMode::Queue,
            max_retries: 3,
        }
    }
}

pub struct RealtimeListener {
    source: Arc<dyn TransactionSource>,
    parser: Arc<dyn SwapParser>,
    db: Arc<dyn DatabasePort>,
    breaker: Arc<CircuitBreaker>,
    tracker: SyncStatusTracker,
    config: ListenerConfig,
}

impl RealtimeListener {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        parser: Arc<dyn SwapParser>,
        db: Arc<dyn DatabasePort>,
        breaker: Arc<CircuitBreaker>,
        tracker: SyncStatusTracker,
        config: ListenerConfig,
    ) -> Self {
        Self {
            source,
            parser,
            db,
            breaker,
            tracker,
            config,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        info!("Realtime listener started");
        self.tracker.start().await.map_err(WorkerError::Status)?;

        let mut baseline_slot: Option<i64> = None;
        let mut ticker = interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(&mut baseline_slot).await {
                        Ok(count) => {
                            if count > 0 {
                                debug!("Realtime pass persisted {} events", count);
                            }
                        }
                        Err(err @ (WorkerError::Checkpoint(_) | WorkerError::Status(_))) => {
                            // Progress we cannot record is progress we must
                            // not claim; pause the lane and report
                            error!("Realtime listener pausing: {}", err);
                            if let Err(e) = self.tracker.fail(&err.to_string()).await {
                                error!("Realtime listener could not record failure: {}", e);
                            }
                            return Err(err);
                        }
                        Err(err) => {
                            warn!("Realtime pass failed, retrying from last checkpoint: {}", err);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Realtime listener shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One polling pass: everything newer than the checkpoint, oldest first.
    pub async fn poll_once(&self, baseline_slot: &mut Option<i64>) -> Result<usize, WorkerError> {
        let checkpoint = self.db.get_checkpoint(REALTIME_LANE).await?;
        let until = checkpoint.and_then(|cp| cp.last_signature);

        // A lane that never ran starts at the current tip; history belongs
        // to the backfill worker
        if until.is_none() && baseline_slot.is_none() {
            let tip = self.source.latest_slot().await?;
            *baseline_slot = Some(tip);
            debug!("Realtime lane baselined at slot {}", tip);
        }

        let mut signatures = self
            .source
            .signatures_for(None, until.as_deref(), self.config.page_limit)
            .await?;
        if until.is_none() {
            if let Some(floor) = *baseline_slot {
                signatures.retain(|sig| sig.slot >= floor);
            }
        }

        let mut persisted = 0;

        for sig in signatures.iter().rev() {
            if sig.failed {
                // Failed transactions carry no events but still move the lane
                self.advance(sig, false).await?;
                continue;
            }

            match self.source.fetch_transaction(&sig.signature).await {
                Ok(raw) => {
                    let stored = match self.parser.parse(&raw) {
                        Some(event) => {
                            persist_swap_event(
                                &self.db,
                                &self.breaker,
                                self.config.persist_mode,
                                self.config.max_retries,
                                &event,
                            )
                            .await?
                        }
                        None => false,
                    };
                    if stored {
                        persisted += 1;
                    }
                    self.advance(sig, stored).await?;
                }
                Err(e) => {
                    // Skip and keep moving; the gap is the backfill lane's job
                    warn!("Failed to fetch transaction {}: {}", sig.signature, e);
                    self.advance(sig, false).await?;
                }
            }
        }

        Ok(persisted)
    }

    /// Checkpoint advance, strictly after the durable write for `sig`.
    async fn advance(&self, sig: &SignatureInfo, stored: bool) -> Result<(), WorkerError> {
        self.db
            .set_checkpoint(
                REALTIME_LANE,
                &CheckpointUpdate::position(sig.slot, &sig.signature),
            )
            .await
            .map_err(WorkerError::Checkpoint)?;

        self.tracker
            .progress(SyncProgress {
                slot: Some(sig.slot),
                signature: Some(sig.signature.clone()),
                timestamp: sig.block_time.or_else(|| Some(Utc::now().timestamp())),
                accounts_delta: if stored { 1 } else { 0 },
            })
            .await
            .map_err(WorkerError::Status)?;

        Ok(())
    }
}
