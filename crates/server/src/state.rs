//! Application state shared across handlers.

use artstore_core::config::AppConfig;
use artstore_metadata::MetadataStore;
use artstore_sync::{SchedulerStatus, SyncEngine};
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Control-plane database.
    pub metadata: Arc<dyn MetadataStore>,
    /// Reconciliation engine (registry, reconcilers, fence).
    pub engine: Arc<SyncEngine>,
    /// Loop states of the periodic scheduler.
    pub scheduler_status: SchedulerStatus,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        engine: Arc<SyncEngine>,
        scheduler_status: SchedulerStatus,
    ) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
            engine,
            scheduler_status,
        }
    }
}
