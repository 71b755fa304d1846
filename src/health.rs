// Aggregated health over the sync components plus database connectivity.
// Read-only: the report is derived from sync_status rows and a ping, never
// from worker-internal state. Constructed once by the composition root and
// shared; tests build their own instances.

use crate::db::port::DatabasePort;
use crate::models::SyncState;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_slot: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts_processed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub last_check: i64,
    pub uptime_secs: u64,
}

#[derive(Clone)]
pub struct HealthCheck {
    db: Arc<dyn DatabasePort>,
    started: Instant,
    last_status: Arc<Mutex<HealthStatus>>,
}

impl HealthCheck {
    pub fn new(db: Arc<dyn DatabasePort>) -> Self {
        Self {
            db,
            started: Instant::now(),
            last_status: Arc::new(Mutex::new(HealthStatus::Healthy)),
        }
    }

    /// Collect component metrics and derive the overall status.
    pub async fn check(&self) -> HealthReport {
        let now = Utc::now().timestamp();
        let mut components = BTreeMap::new();

        match self.db.list_sync_status().await {
            Ok(records) => {
                for record in records {
                    components.insert(
                        record.component.as_str().to_string(),
                        ComponentHealth {
                            status: record.status.as_str().to_string(),
                            last_processed_slot: record.last_processed_slot,
                            accounts_processed: Some(record.accounts_processed),
                            error_message: record.error_message,
                            updated_at: record.updated_at,
                        },
                    );
                }
            }
            Err(e) => {
                warn!("Could not collect sync status for health check: {}", e);
                components.insert(
                    "sync_status".to_string(),
                    ComponentHealth {
                        status: "unhealthy".to_string(),
                        last_processed_slot: None,
                        accounts_processed: None,
                        error_message: Some(e.to_string()),
                        updated_at: now,
                    },
                );
            }
        }

        let database_status = match self.db.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                warn!("Database health check failed: {}", e);
                "unhealthy"
            }
        };
        components.insert(
            "database".to_string(),
            ComponentHealth {
                status: database_status.to_string(),
                last_processed_slot: None,
                accounts_processed: None,
                error_message: None,
                updated_at: now,
            },
        );

        let status = Self::derive(&components);
        self.update_status(status).await;

        HealthReport {
            status,
            components,
            last_check: now,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    fn derive(components: &BTreeMap<String, ComponentHealth>) -> HealthStatus {
        let failed = |s: &str| s == SyncState::Failed.as_str() || s == "unhealthy";
        let degraded = |s: &str| s == SyncState::Stopped.as_str() || s == "degraded";

        if components.values().any(|c| failed(&c.status)) {
            HealthStatus::Unhealthy
        } else if components.values().any(|c| degraded(&c.status)) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    async fn update_status(&self, status: HealthStatus) {
        let mut last = self.last_status.lock().await;
        if *last != status {
            info!("Health status changed from {:?} to {:?}", *last, status);
            *last = status;
        }
    }

    /// Last derived status, without re-running the checks.
    pub async fn status(&self) -> HealthStatus {
        *self.last_status.lock().await
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
