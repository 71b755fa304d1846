pub mod api;
pub mod breaker;
pub mod chain;
pub mod config;
pub mod db;
pub mod health;
pub mod models;
pub mod queue;
pub mod state;
pub mod status;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience if desired
pub use api::error::ApiError;
pub use api::response::ApiResponse;
pub use api::route::create_router;
pub use breaker::{BreakerError, CircuitBreaker, CircuitBreakerOptions, CircuitState};
pub use chain::{BackfillWorker, JsonSwapParser, RealtimeListener, RpcSource};
pub use db::connection;
pub use db::memory::MemoryDatabase;
pub use db::port::{DatabasePort, ErrorClass, StoreError};
pub use db::sqlite::SqliteDatabase;
pub use health::HealthCheck;
pub use models::SwapEvent;
pub use queue::{ProcessorConfig, QueueProcessor};
pub use status::SyncStatusTracker;
pub use validation::{validate_signature, validate_solana_address};
