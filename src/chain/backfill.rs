// Backfill lane: walks program history between the `backfill` checkpoint
// and the chain tip captured at start, oldest batch first, checkpointing
// after each fully persisted batch. Restart-safe by construction: the
// checkpoint signature is the exclusive lower bound of the next walk, so a
// crash never skips the range between checkpoint and crash point.

use crate::breaker::CircuitBreaker;
use crate::chain::parser::SwapParser;
use crate::chain::source::{SignatureInfo, TransactionSource};
use crate::chain::{persist_swap_event, PersistMode, WorkerError};
use crate::db::port::DatabasePort;
use crate::models::{CheckpointUpdate, SyncProgress, BACKFILL_LANE};
use crate::status::SyncStatusTracker;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub page_limit: usize,
    pub fetch_chunk: usize,
    pub genesis_slot: i64,
    pub persist_mode: PersistMode,
    pub max_retries: i64,
    pub request_pause: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_limit: 50,
            fetch_chunk: 10,
            genesis_slot: 0,
            persist_mode: PersistMode::Queue,
            max_retries: 3,
            request_pause: Duration::from_millis(200),
        }
    }
}

pub struct BackfillWorker {
    source: Arc<dyn TransactionSource>,
    parser: Arc<dyn SwapParser>,
    db: Arc<dyn DatabasePort>,
    breaker: Arc<CircuitBreaker>,
    tracker: SyncStatusTracker,
    config: BackfillConfig,
}

impl BackfillWorker {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        parser: Arc<dyn SwapParser>,
        db: Arc<dyn DatabasePort>,
        breaker: Arc<CircuitBreaker>,
        tracker: SyncStatusTracker,
        config: BackfillConfig,
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

    /// One complete backfill run. Terminates at the tip captured at start;
    /// newer blocks need a fresh invocation.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        self.tracker.start().await.map_err(WorkerError::Status)?;

        match self.run_to_target(&shutdown).await {
            Ok(true) => {
                self.tracker.complete().await.map_err(WorkerError::Status)?;
                Ok(())
            }
            Ok(false) => {
                info!("Backfill interrupted by shutdown, resumable from checkpoint");
                Ok(())
            }
            Err(err) => {
                error!("Backfill failed, resumable from checkpoint: {}", err);
                if let Err(e) = self.tracker.fail(&err.to_string()).await {
                    error!("Backfill could not record failure: {}", e);
                }
                Err(err)
            }
        }
    }

    /// Returns Ok(false) when interrupted by shutdown before reaching the
    /// target, Ok(true) on completion.
    pub async fn run_to_target(&self, shutdown: &CancellationToken) -> Result<bool, WorkerError> {
        let target = self.source.latest_slot().await?;
        let checkpoint = self.db.get_checkpoint(BACKFILL_LANE).await?;
        let until = checkpoint
            .as_ref()
            .and_then(|cp| cp.last_signature.clone());
        let floor = checkpoint
            .as_ref()
            .and_then(|cp| cp.last_slot)
            .unwrap_or(self.config.genesis_slot);

        info!("Backfill walking history from slot {} to {}", floor, target);

        // Collect signature pages newest-first; processing replays them
        // oldest-first so the checkpoint only ever moves forward
        let mut pages: Vec<Vec<SignatureInfo>> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            if shutdown.is_cancelled() {
                return Ok(false);
            }

            let page = self
                .source
                .signatures_for(before.as_deref(), until.as_deref(), self.config.page_limit)
                .await?;
            if page.is_empty() {
                break;
            }

            before = page.last().map(|sig| sig.signature.clone());
            let exhausted = page.len() < self.config.page_limit;
            let crossed_floor = page.iter().any(|sig| sig.slot < floor);

            let kept: Vec<SignatureInfo> = page
                .into_iter()
                .filter(|sig| !sig.failed && sig.slot >= floor && sig.slot <= target)
                .collect();
            if !kept.is_empty() {
                pages.push(kept);
            }

            if exhausted || crossed_floor {
                break;
            }

            sleep(self.config.request_pause).await;
        }

        let mut total = 0;
        for page in pages.iter().rev() {
            if shutdown.is_cancelled() {
                return Ok(false);
            }
            total += self.process_batch(page).await?;
        }

        info!("Backfill reached target slot {} ({} events)", target, total);
        Ok(true)
    }

    /// Persist every event in one page, then checkpoint it. The checkpoint
    /// write is part of the batch: if it fails the batch does not count and
    /// is re-walked on the next run.
    async fn process_batch(&self, page: &[SignatureInfo]) -> Result<usize, WorkerError> {
        let mut persisted = 0;

        // Oldest first within the page, fetched in small concurrent chunks
        let ordered: Vec<&SignatureInfo> = page.iter().rev().collect();
        for chunk in ordered.chunks(self.config.fetch_chunk) {
            let futures: Vec<_> = chunk
                .iter()
                .map(|sig| self.source.fetch_transaction(&sig.signature))
                .collect();

            for (i, result) in futures::future::join_all(futures)
                .await
                .into_iter()
                .enumerate()
            {
                match result {
                    Ok(raw) => {
                        if let Some(event) = self.parser.parse(&raw) {
                            if persist_swap_event(
                                &self.db,
                                &self.breaker,
                                self.config.persist_mode,
                                self.config.max_retries,
                                &event,
                            )
                            .await?
                            {
                                persisted += 1;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to fetch transaction {}: {}", chunk[i].signature, e);
                    }
                }
            }

            sleep(self.config.request_pause).await;
        }

        let Some(newest) = page.first() else {
            return Ok(persisted);
        };
        let max_slot = page.iter().map(|sig| sig.slot).max().unwrap_or(newest.slot);

        self.db
            .set_checkpoint(
                BACKFILL_LANE,
                &CheckpointUpdate::position(max_slot, &newest.signature),
            )
            .await
            .map_err(WorkerError::Checkpoint)?;

        self.tracker
            .progress(SyncProgress {
                slot: Some(max_slot),
                signature: Some(newest.signature.clone()),
                timestamp: Some(Utc::now().timestamp()),
                accounts_delta: persisted as i64,
            })
            .await
            .map_err(WorkerError::Status)?;

        debug!(
            "Backfill batch checkpointed at slot {} ({} events)",
            max_slot, persisted
        );

        Ok(persisted)
    }
}
