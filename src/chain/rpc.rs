use crate::chain::source::{RawTransaction, SignatureInfo, SourceError, TransactionSource};
use crate::config::Config;
use async_trait::async_trait;
use solana_client::rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient};
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Production transaction source over the Solana JSON-RPC API, scoped to
/// the configured swap program address.
pub struct RpcSource {
    rpc_client: RpcClient,
    commitment: CommitmentConfig,
    program: Pubkey,
}

impl RpcSource {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let rpc_url = &config.solana_rpc_url;
        let timeout = Duration::from_secs(config.rpc_timeout_secs);

        // Use commitment level from config or default to "confirmed"
        let commitment = match config.solana_commitment_level.as_str() {
            "processed" => CommitmentConfig::processed(),
            "confirmed" => CommitmentConfig::confirmed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        };

        let program = Pubkey::from_str(&config.program_address)
            .map_err(|_| SourceError::Pubkey(config.program_address.clone()))?;

        info!(
            "Initializing RPC source for program {} at {}, commitment: {:?}",
            program, rpc_url, commitment
        );

        let rpc_client =
            RpcClient::new_with_timeout_and_commitment(rpc_url.clone(), timeout, commitment);

        Ok(Self {
            rpc_client,
            commitment,
            program,
        })
    }
}

#[async_trait]
impl TransactionSource for RpcSource {
    async fn latest_slot(&self) -> Result<i64, SourceError> {
        let slot = self.rpc_client.get_slot_with_commitment(self.commitment)?;
        Ok(slot as i64)
    }

    async fn signatures_for(
        &self,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, SourceError> {
        // Parse before/until cursors
        let before_sig = match before {
            Some(sig) => Some(
                Signature::from_str(sig).map_err(|_| SourceError::Signature(sig.to_string()))?,
            ),
            None => None,
        };
        let until_sig = match until {
            Some(sig) => Some(
                Signature::from_str(sig).map_err(|_| SourceError::Signature(sig.to_string()))?,
            ),
            None => None,
        };

        let signatures = self.rpc_client.get_signatures_for_address_with_config(
            &self.program,
            GetConfirmedSignaturesForAddress2Config {
                before: before_sig,
                until: until_sig,
                limit: Some(limit),
                commitment: Some(self.commitment),
            },
        )?;

        Ok(signatures
            .into_iter()
            .map(|sig| SignatureInfo {
                signature: sig.signature,
                slot: sig.slot as i64,
                block_time: sig.block_time,
                failed: sig.err.is_some(),
            })
            .collect())
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<RawTransaction, SourceError> {
        let parsed = Signature::from_str(signature)
            .map_err(|_| SourceError::Signature(signature.to_string()))?;

        // Parsed encoding so the payload reaches the parser as plain JSON
        let config = RpcTransactionConfig {
            encoding: Some(solana_transaction_status::UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let tx = self
            .rpc_client
            .get_transaction_with_config(&parsed, config)?;

        let payload = serde_json::to_value(&tx.transaction)?;

        Ok(RawTransaction {
            signature: signature.to_string(),
            slot: tx.slot as i64,
            block_time: tx.block_time,
            payload,
        })
    }
}
