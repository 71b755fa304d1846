// Shared test fixtures: an in-memory database pool, a canned transaction
// source, and a parser double that reads events straight out of the
// fixture payload.

use crate::chain::parser::SwapParser;
use crate::chain::source::{RawTransaction, SignatureInfo, SourceError, TransactionSource};
use crate::db::INIT_SCHEMA;
use crate::models::SwapEvent;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Mutex;

pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::raw_sql(INIT_SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to apply schema");

    pool
}

pub fn sample_event(signature: &str, slot: i64) -> SwapEvent {
    SwapEvent {
        signature: signature.to_string(),
        user_pubkey: "9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn".to_string(),
        token_in: "So11111111111111111111111111111111111111112".to_string(),
        token_out: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
        amount_in: 1_500_000_000,
        amount_out: 123_456_789,
        slot,
        block_time: 1_700_000_000 + slot,
        route: Some("direct".to_string()),
        raw: None,
    }
}

/// Wrap an event in the payload shape `FixtureParser` understands.
pub fn raw_tx_for(event: &SwapEvent) -> RawTransaction {
    RawTransaction {
        signature: event.signature.clone(),
        slot: event.slot,
        block_time: Some(event.block_time),
        payload: serde_json::json!({ "swap": event }),
    }
}

/// A transaction the parser yields nothing for.
pub fn raw_tx_irrelevant(signature: &str, slot: i64) -> RawTransaction {
    RawTransaction {
        signature: signature.to_string(),
        slot,
        block_time: Some(1_700_000_000 + slot),
        payload: serde_json::json!({ "memo": "unrelated" }),
    }
}

/// Parser double: yields the event embedded under the "swap" key.
pub struct FixtureParser;

impl SwapParser for FixtureParser {
    fn parse(&self, tx: &RawTransaction) -> Option<SwapEvent> {
        let value = tx.payload.get("swap")?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Source double over a fixed chain of transactions held oldest-first.
pub struct FixtureSource {
    chain: Mutex<Vec<RawTransaction>>,
}

impl FixtureSource {
    pub fn new(txs: Vec<RawTransaction>) -> Self {
        Self {
            chain: Mutex::new(txs),
        }
    }

    /// Append a newly "produced" transaction at the tip.
    pub fn push(&self, tx: RawTransaction) {
        self.chain.lock().unwrap().push(tx);
    }
}

#[async_trait]
impl TransactionSource for FixtureSource {
    async fn latest_slot(&self) -> Result<i64, SourceError> {
        Ok(self
            .chain
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.slot)
            .max()
            .unwrap_or(0))
    }

    async fn signatures_for(
        &self,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, SourceError> {
        let chain = self.chain.lock().unwrap();
        let mut newest_first: Vec<&RawTransaction> = chain.iter().rev().collect();

        if let Some(before) = before {
            match newest_first
                .iter()
                .position(|tx| tx.signature == before)
            {
                Some(pos) => {
                    newest_first = newest_first.split_off(pos + 1);
                }
                None => newest_first.clear(),
            }
        }

        let mut out = Vec::new();
        for tx in newest_first {
            if Some(tx.signature.as_str()) == until {
                break;
            }
            out.push(SignatureInfo {
                signature: tx.signature.clone(),
                slot: tx.slot,
                block_time: tx.block_time,
                failed: false,
            });
            if out.len() >= limit {
                break;
            }
        }

        Ok(out)
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<RawTransaction, SourceError> {
        self.chain
            .lock()
            .unwrap()
            .iter()
            .find(|tx| tx.signature == signature)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("unknown transaction {signature}")))
    }
}
