use crate::config::Config;
use crate::db::port::DatabasePort;
use crate::health::HealthCheck;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub db: Arc<dyn DatabasePort>,
    pub health: HealthCheck,
}
