pub mod connection;
pub mod memory;
pub mod port;
pub mod sqlite;

pub const INIT_SCHEMA: &str = r#"
-- Persisted swap events, one row per signature
CREATE TABLE IF NOT EXISTS swaps (
    signature TEXT PRIMARY KEY,
    user_pubkey TEXT NOT NULL,
    token_in TEXT NOT NULL,
    token_out TEXT NOT NULL,
    amount_in TEXT NOT NULL,
    amount_out TEXT NOT NULL,
    slot INTEGER NOT NULL,
    block_time INTEGER NOT NULL,
    route TEXT,
    raw TEXT
);

-- Per-lane sync checkpoints
CREATE TABLE IF NOT EXISTS checkpoints (
    id TEXT PRIMARY KEY,
    last_slot INTEGER,
    last_signature TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Latest decoded state per tracked account; updated_slot guards ordering
CREATE TABLE IF NOT EXISTS tracked_accounts (
    pubkey TEXT PRIMARY KEY,
    account_type TEXT NOT NULL,
    data TEXT NOT NULL,
    last_event TEXT NOT NULL,
    updated_slot INTEGER NOT NULL,
    last_signature TEXT,
    closed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Durable at-least-once work queue
CREATE TABLE IF NOT EXISTS processing_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_pubkey TEXT NOT NULL,
    account_type TEXT NOT NULL,
    account_data TEXT NOT NULL,
    event_type TEXT NOT NULL,
    slot INTEGER NOT NULL,
    signature TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    error_message TEXT,
    next_attempt_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    processing_started_at INTEGER,
    processed_at INTEGER
);

-- One row per sync component
CREATE TABLE IF NOT EXISTS sync_status (
    component TEXT PRIMARY KEY,
    last_processed_slot INTEGER,
    last_processed_signature TEXT,
    last_processed_timestamp INTEGER,
    accounts_processed INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT,
    started_at INTEGER,
    completed_at INTEGER,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Indexes for the hot paths
CREATE INDEX IF NOT EXISTS idx_swaps_user ON swaps(user_pubkey);
CREATE INDEX IF NOT EXISTS idx_swaps_slot ON swaps(slot);
CREATE INDEX IF NOT EXISTS idx_queue_status_created ON processing_queue(status, created_at);
CREATE INDEX IF NOT EXISTS idx_queue_account ON processing_queue(account_pubkey);
CREATE INDEX IF NOT EXISTS idx_queue_slot ON processing_queue(slot);
CREATE INDEX IF NOT EXISTS idx_accounts_type ON tracked_accounts(account_type);
CREATE INDEX IF NOT EXISTS idx_sync_status ON sync_status(status);
"#;
