// Domain records shared across the ingestion pipeline:
// - SwapEvent: the decoded on-chain fact we persist
// - Processing queue entry + status machine
// - Checkpoint per sync lane
// - Sync status record per named component

use serde::{Deserialize, Serialize};

/// Checkpoint lane identifiers. Other named lanes are allowed by the store;
/// these two are the ones the built-in workers own.
pub const REALTIME_LANE: &str = "realtime";
pub const BACKFILL_LANE: &str = "backfill";

/// Queue entries carrying a serialized `SwapEvent` use this account type.
pub const SWAP_ENTRY_TYPE: &str = "swap";

/// One observed swap. Immutable once produced; `signature` is the natural
/// key for deduplication. Amounts are kept as u128 end to end and cross the
/// SQL boundary as strings so no precision is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub signature: String,
    pub user_pubkey: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: u128,
    pub amount_out: u128,
    pub slot: i64,
    pub block_time: i64,
    pub route: Option<String>,
    pub raw: Option<serde_json::Value>,
}

/// What happened to the account a queue entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Close,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(EventKind::Create),
            "update" => Some(EventKind::Update),
            "close" => Some(EventKind::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "processing" => Some(QueueStatus::Processing),
            "completed" => Some(QueueStatus::Completed),
            "failed" => Some(QueueStatus::Failed),
            _ => None,
        }
    }
}

/// A unit of pending work handed to the queue by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueEntry {
    pub account_pubkey: String,
    pub account_type: String,
    pub account_data: serde_json::Value,
    pub event_type: EventKind,
    pub slot: i64,
    pub signature: Option<String>,
    pub max_retries: i64,
}

impl NewQueueEntry {
    /// Stage a swap event for the queue processor.
    pub fn for_swap(event: &SwapEvent, max_retries: i64) -> Result<Self, serde_json::Error> {
        Ok(Self {
            account_pubkey: event.user_pubkey.clone(),
            account_type: SWAP_ENTRY_TYPE.to_string(),
            account_data: serde_json::to_value(event)?,
            event_type: EventKind::Create,
            slot: event.slot,
            signature: Some(event.signature.clone()),
            max_retries,
        })
    }
}

/// A claimed or inspected queue row. `account_data` stays as the raw stored
/// JSON text; the processor decodes it at apply time so a malformed payload
/// surfaces as a permanent error there, not as a row-mapping failure.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: i64,
    pub account_pubkey: String,
    pub account_type: String,
    pub account_data: String,
    pub event_type: EventKind,
    pub slot: i64,
    pub signature: Option<String>,
    pub status: QueueStatus,
    pub retry_count: i64,
    pub max_retries: i64,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub processing_started_at: Option<i64>,
    pub processed_at: Option<i64>,
}

/// Queue depth by status, for the operational surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Decoded account state to fold into `tracked_accounts`. Writes are guarded
/// by `slot`: a lower-slot update never overwrites a higher-slot row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub pubkey: String,
    pub account_type: String,
    pub data: serde_json::Value,
    pub event: EventKind,
    pub slot: i64,
    pub signature: Option<String>,
}

/// Last processed position of a sync lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub last_slot: Option<i64>,
    pub last_signature: Option<String>,
}

/// Partial checkpoint write; only supplied fields are overwritten.
#[derive(Debug, Clone, Default)]
pub struct CheckpointUpdate {
    pub last_slot: Option<i64>,
    pub last_signature: Option<String>,
}

impl CheckpointUpdate {
    pub fn position(slot: i64, signature: &str) -> Self {
        Self {
            last_slot: Some(slot),
            last_signature: Some(signature.to_string()),
        }
    }
}

/// The five named sync components tracked for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncComponent {
    HistoricalSync,
    AccountListener,
    QueueProcessor,
    LiveSync,
    GapRecovery,
}

impl SyncComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncComponent::HistoricalSync => "historical_sync",
            SyncComponent::AccountListener => "account_listener",
            SyncComponent::QueueProcessor => "queue_processor",
            SyncComponent::LiveSync => "live_sync",
            SyncComponent::GapRecovery => "gap_recovery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "historical_sync" => Some(SyncComponent::HistoricalSync),
            "account_listener" => Some(SyncComponent::AccountListener),
            "queue_processor" => Some(SyncComponent::QueueProcessor),
            "live_sync" => Some(SyncComponent::LiveSync),
            "gap_recovery" => Some(SyncComponent::GapRecovery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Running,
    Stopped,
    Completed,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Running => "running",
            SyncState::Stopped => "stopped",
            SyncState::Completed => "completed",
            SyncState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SyncState::Running),
            "stopped" => Some(SyncState::Stopped),
            "completed" => Some(SyncState::Completed),
            "failed" => Some(SyncState::Failed),
            _ => None,
        }
    }
}

/// A progress step reported by a worker.
#[derive(Debug, Clone, Default)]
pub struct SyncProgress {
    pub slot: Option<i64>,
    pub signature: Option<String>,
    pub timestamp: Option<i64>,
    pub accounts_delta: i64,
}

/// One row per component in `sync_status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusRecord {
    pub component: SyncComponent,
    pub last_processed_slot: Option<i64>,
    pub last_processed_signature: Option<String>,
    pub last_processed_timestamp: Option<i64>,
    pub accounts_processed: i64,
    pub status: SyncState,
    pub error_message: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}
