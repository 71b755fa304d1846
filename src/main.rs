// Composition root:
// - Initialize configuration and logging
// - Create database connection pool and verify connectivity
// - Construct ports, breaker and health check
// - Start realtime listener, backfill worker and queue processors
// - Start HTTP server, shut everything down on ctrl-c

use swap_indexer_service::{
    api, breaker::CircuitBreakerOptions, config::Config, connection, db::port::DatabasePort,
    models::SyncComponent, queue::ProcessorConfig, state::AppState, validation, CircuitBreaker,
    HealthCheck, JsonSwapParser, QueueProcessor, SqliteDatabase, SyncStatusTracker,
};

use backon::{ExponentialBuilder, Retryable};
use swap_indexer_service::chain::{
    backfill::BackfillConfig, listener::ListenerConfig, source::TransactionSource, BackfillWorker,
    PersistMode, RealtimeListener, RpcSource, SwapParser,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting swap-indexer-service");

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    validation::validate_solana_address(&config.program_address)?;

    // Setup database connection, retrying while the database comes up
    let database_url = config.database_url.clone();
    let db_pool = (|| async { connection::establish_connection(&database_url).await })
        .retry(ExponentialBuilder::default())
        .await?;
    info!("Database connection established");

    let db: Arc<dyn DatabasePort> = Arc::new(SqliteDatabase::new(db_pool.clone()));
    db.init().await?;
    info!("Database connection verified");

    // One breaker guards the shared database dependency
    let db_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerOptions {
        name: "database".to_string(),
        failure_threshold: config.breaker_failure_threshold,
        reset_timeout: config.breaker_reset_timeout,
        success_threshold: config.breaker_success_threshold,
    }));

    let health = HealthCheck::new(db.clone());

    let source: Arc<dyn TransactionSource> = Arc::new(RpcSource::new(&config)?);
    let parser: Arc<dyn SwapParser> = Arc::new(JsonSwapParser::new(&config.program_address));
    let persist_mode = PersistMode::parse(&config.persist_mode).unwrap_or(PersistMode::Queue);

    let shutdown = CancellationToken::new();

    // Start realtime listener
    let listener = RealtimeListener::new(
        source.clone(),
        parser.clone(),
        db.clone(),
        db_breaker.clone(),
        SyncStatusTracker::new(db.clone(), SyncComponent::LiveSync),
        ListenerConfig {
            poll_interval: config.poll_interval,
            page_limit: config.realtime_page_limit,
            persist_mode,
            max_retries: config.queue_max_retries,
        },
    );
    let listener_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = listener.run(listener_shutdown).await {
            error!("Realtime listener stopped: {}", e);
        }
    });
    info!("Realtime listener task started");

    // Start backfill worker; it terminates once it reaches the tip captured
    // at startup
    let backfill = BackfillWorker::new(
        source.clone(),
        parser.clone(),
        db.clone(),
        db_breaker.clone(),
        SyncStatusTracker::new(db.clone(), SyncComponent::HistoricalSync),
        BackfillConfig {
            page_limit: config.backfill_page_limit,
            fetch_chunk: config.fetch_chunk_size,
            genesis_slot: config.backfill_genesis_slot,
            persist_mode,
            max_retries: config.queue_max_retries,
            request_pause: std::time::Duration::from_millis(200),
        },
    );
    let backfill_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = backfill.run(backfill_shutdown).await {
            error!("Backfill worker stopped: {}", e);
        }
    });
    info!("Backfill worker task started");

    // Start queue processors
    for id in 0..config.queue_workers {
        let processor = QueueProcessor::new(
            id,
            db_pool.clone(),
            db.clone(),
            db_breaker.clone(),
            SyncStatusTracker::new(db.clone(), SyncComponent::QueueProcessor),
            ProcessorConfig {
                batch_size: config.queue_batch_size,
                poll_interval: config.queue_poll_interval,
                lease_secs: config.queue_lease_secs,
                retry_base_secs: config.queue_retry_base_secs,
            },
        );
        let processor_shutdown = shutdown.clone();
        tokio::spawn(async move {
            processor.run(processor_shutdown).await;
        });
    }
    info!("Started {} queue processors", config.queue_workers);

    // Start HTTP server
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db_pool: db_pool.clone(),
        db: db.clone(),
        health,
    });
    let app = api::create_router(app_state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on {}", addr);
    let tcp_listener = tokio::net::TcpListener::bind(&addr).await?;

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    let server_shutdown = shutdown.clone();
    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    info!("swap-indexer-service stopped");
    Ok(())
}
