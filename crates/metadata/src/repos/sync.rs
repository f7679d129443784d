//! Sync state and run history repositories.

use crate::error::MetadataResult;
use crate::models::{SyncRunRow, SyncStateRow};
use artstore_core::SyncKind;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for the singleton sync state row.
#[async_trait]
pub trait SyncStateRepo: Send + Sync {
    async fn get_sync_state(&self) -> MetadataResult<SyncStateRow>;

    /// Advance the last-successful timestamp of one sync kind.
    async fn touch_sync_state(&self, kind: SyncKind, at: OffsetDateTime) -> MetadataResult<()>;
}

/// Repository for completed sync run summaries.
#[async_trait]
pub trait SyncRunRepo: Send + Sync {
    async fn record_sync_run(&self, run: &SyncRunRow) -> MetadataResult<()>;

    /// Most recent runs first.
    async fn list_sync_runs(
        &self,
        kind: Option<&str>,
        target_id: Option<&str>,
        limit: u32,
    ) -> MetadataResult<Vec<SyncRunRow>>;
}
