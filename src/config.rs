// Configuration for:
// - Database connection string
// - RPC endpoint and tracked program address
// - Listener / backfill polling behaviour
// - Queue processing and retry bounds
// - Circuit breaker thresholds
// - Server listening address/port

use dotenv::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub solana_rpc_url: String,
    pub solana_commitment_level: String,
    pub rpc_timeout_secs: u64,
    pub program_address: String,
    pub poll_interval: Duration,
    pub realtime_page_limit: usize,
    pub backfill_page_limit: usize,
    pub backfill_genesis_slot: i64,
    pub fetch_chunk_size: usize,
    pub persist_mode: String,
    pub queue_workers: usize,
    pub queue_batch_size: i64,
    pub queue_poll_interval: Duration,
    pub queue_lease_secs: i64,
    pub queue_max_retries: i64,
    pub queue_retry_base_secs: i64,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
    pub breaker_success_threshold: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:swaps.db".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let solana_rpc_url = env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
        let solana_commitment_level =
            env::var("SOLANA_COMMITMENT_LEVEL").unwrap_or_else(|_| "confirmed".to_string());
        let rpc_timeout_secs = env::var("RPC_TIMEOUT_SECS")
            .map(|v| v.parse().unwrap_or(30))
            .unwrap_or(30);
        let program_address = env::var("PROGRAM_ADDRESS").unwrap_or_default();
        let poll_interval = env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));
        let realtime_page_limit = env::var("REALTIME_PAGE_LIMIT")
            .map(|v| v.parse().unwrap_or(100))
            .unwrap_or(100);
        let backfill_page_limit = env::var("BACKFILL_PAGE_LIMIT")
            .map(|v| v.parse().unwrap_or(50))
            .unwrap_or(50);
        let backfill_genesis_slot = env::var("BACKFILL_GENESIS_SLOT")
            .map(|v| v.parse().unwrap_or(0))
            .unwrap_or(0);
        let fetch_chunk_size = env::var("FETCH_CHUNK_SIZE")
            .map(|v| v.parse().unwrap_or(10))
            .unwrap_or(10);
        let persist_mode = env::var("PERSIST_MODE").unwrap_or_else(|_| "queue".to_string());
        let queue_workers = env::var("QUEUE_WORKERS")
            .map(|v| v.parse().unwrap_or_else(|_| num_cpus::get()))
            .unwrap_or_else(|_| num_cpus::get());
        let queue_batch_size = env::var("QUEUE_BATCH_SIZE")
            .map(|v| v.parse().unwrap_or(25))
            .unwrap_or(25);
        let queue_poll_interval = env::var("QUEUE_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(1));
        let queue_lease_secs = env::var("QUEUE_LEASE_SECS")
            .map(|v| v.parse().unwrap_or(300))
            .unwrap_or(300);
        let queue_max_retries = env::var("QUEUE_MAX_RETRIES")
            .map(|v| v.parse().unwrap_or(3))
            .unwrap_or(3);
        let queue_retry_base_secs = env::var("QUEUE_RETRY_BASE_SECS")
            .map(|v| v.parse().unwrap_or(5))
            .unwrap_or(5);
        let breaker_failure_threshold = env::var("BREAKER_FAILURE_THRESHOLD")
            .map(|v| v.parse().unwrap_or(5))
            .unwrap_or(5);
        let breaker_reset_timeout = env::var("BREAKER_RESET_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(30_000));
        let breaker_success_threshold = env::var("BREAKER_SUCCESS_THRESHOLD")
            .map(|v| v.parse().unwrap_or(2))
            .unwrap_or(2);

        Self {
            database_url,
            server_host,
            server_port,
            solana_rpc_url,
            solana_commitment_level,
            rpc_timeout_secs,
            program_address,
            poll_interval,
            realtime_page_limit,
            backfill_page_limit,
            backfill_genesis_slot,
            fetch_chunk_size,
            persist_mode,
            queue_workers,
            queue_batch_size,
            queue_poll_interval,
            queue_lease_secs,
            queue_max_retries,
            queue_retry_base_secs,
            breaker_failure_threshold,
            breaker_reset_timeout,
            breaker_success_threshold,
        }
    }
}
