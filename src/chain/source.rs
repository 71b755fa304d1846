// The transaction source abstraction the listener and backfill worker pull
// from. Production implementation: chain::rpc. Tests drive the workers with
// a fixture source instead of a network.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("RPC error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),

    #[error("Invalid signature: {0}")]
    Signature(String),

    #[error("Invalid public key: {0}")]
    Pubkey(String),

    #[error("Unsupported encoding for transaction {0}")]
    Encoding(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Position entry from signature pagination, newest first.
#[derive(Debug, Clone)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: i64,
    pub block_time: Option<i64>,
    pub failed: bool,
}

/// One fetched transaction, opaque to everything but the parser. The
/// payload is whatever parsed JSON the source produced; the pipeline only
/// relies on signature, slot and block time.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: i64,
    pub block_time: Option<i64>,
    pub payload: Value,
}

#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Current tip of the chain as seen by the source.
    async fn latest_slot(&self) -> Result<i64, SourceError>;

    /// Page of signatures for the tracked program, newest first. `before`
    /// is the pagination cursor, `until` the exclusive lower bound.
    async fn signatures_for(
        &self,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, SourceError>;

    async fn fetch_transaction(&self, signature: &str) -> Result<RawTransaction, SourceError>;
}
