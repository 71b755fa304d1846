// Sync status tracking, one tracker per named component. Purely
// observational: records where a lane is and whether it is running,
// never drives worker control flow.

use crate::db::port::{DatabasePort, StoreError};
use crate::models::{SyncComponent, SyncProgress, SyncStatusRecord};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SyncStatusTracker {
    db: Arc<dyn DatabasePort>,
    component: SyncComponent,
}

impl SyncStatusTracker {
    pub fn new(db: Arc<dyn DatabasePort>, component: SyncComponent) -> Self {
        Self { db, component }
    }

    pub fn component(&self) -> SyncComponent {
        self.component
    }

    /// Mark the component running and clear any previous terminal state.
    pub async fn start(&self) -> Result<(), StoreError> {
        debug!("Sync component {} starting", self.component.as_str());
        self.db.sync_started(self.component).await
    }

    /// Record a processed position and how many records it covered.
    pub async fn progress(&self, progress: SyncProgress) -> Result<(), StoreError> {
        self.db.sync_progress(self.component, &progress).await
    }

    pub async fn complete(&self) -> Result<(), StoreError> {
        debug!("Sync component {} completed", self.component.as_str());
        self.db.sync_completed(self.component).await
    }

    pub async fn fail(&self, error: &str) -> Result<(), StoreError> {
        self.db.sync_failed(self.component, error).await
    }

    pub async fn current(&self) -> Result<Option<SyncStatusRecord>, StoreError> {
        self.db.get_sync_status(self.component).await
    }
}
