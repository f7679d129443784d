//! Storage element repository.

use crate::error::MetadataResult;
use crate::models::{ElementInfoUpdate, StorageElementRow};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for the storage element catalog.
#[async_trait]
pub trait StorageElementRepo: Send + Sync {
    /// Create a catalog entry. Duplicate name, base URL or reported id
    /// yields `AlreadyExists`.
    async fn create_storage_element(&self, element: &StorageElementRow) -> MetadataResult<()>;

    async fn get_storage_element(&self, element_id: Uuid)
    -> MetadataResult<Option<StorageElementRow>>;

    /// Look up an element by the id its node reports.
    async fn get_storage_element_by_reported_id(
        &self,
        reported_id: &str,
    ) -> MetadataResult<Option<StorageElementRow>>;

    /// List all elements ordered by name.
    async fn list_storage_elements(&self) -> MetadataResult<Vec<StorageElementRow>>;

    /// Update the administrative fields (name, base URL, description).
    async fn update_storage_element(&self, element: &StorageElementRow) -> MetadataResult<()>;

    /// Record a successful info probe and advance the storage sync timestamp.
    async fn record_element_info(
        &self,
        element_id: Uuid,
        info: &ElementInfoUpdate,
        synced_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Mark an element offline after a failed probe. Capacity and mode keep
    /// their last reported values.
    async fn mark_element_unreachable(
        &self,
        element_id: Uuid,
        error: &str,
        at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete an element. Fails with `Constraint` while file records
    /// reference it.
    async fn delete_storage_element(&self, element_id: Uuid) -> MetadataResult<()>;

    /// Count file records (any status) on an element.
    async fn count_files_for_element(&self, element_id: Uuid) -> MetadataResult<u64>;
}
