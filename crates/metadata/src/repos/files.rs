//! File registry repository.

use crate::error::MetadataResult;
use crate::models::{AppliedChanges, FileChangeSet, FileFilter, FileRow};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for file records.
///
/// No method physically removes a file row.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Register a file. The element must exist (`Constraint` otherwise).
    async fn create_file(&self, file: &FileRow) -> MetadataResult<()>;

    async fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRow>>;

    /// List files matching a filter, ordered by creation time.
    async fn list_files(&self, filter: &FileFilter) -> MetadataResult<Vec<FileRow>>;

    /// All records (any status) on one element.
    async fn list_files_for_element(&self, element_id: Uuid) -> MetadataResult<Vec<FileRow>>;

    /// Change retention policy and expiry of a file.
    async fn update_file_retention(
        &self,
        file_id: Uuid,
        retention_policy: &str,
        expires_at: Option<OffsetDateTime>,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Flip an active record to `deleted`. Returns false when the record was
    /// already in a terminal state.
    async fn tombstone_file(&self, file_id: Uuid, at: OffsetDateTime) -> MetadataResult<bool>;

    /// Flip a `deleted` record back to `active`. Returns false when the record
    /// was not deleted.
    async fn restore_file(&self, file_id: Uuid, at: OffsetDateTime) -> MetadataResult<bool>;

    /// Apply one reconciliation run for an element in a single transaction.
    ///
    /// Also expires due records, advances the element's and the global
    /// file sync timestamps.
    async fn apply_file_changes(
        &self,
        element_id: Uuid,
        changes: &FileChangeSet,
        synced_at: OffsetDateTime,
    ) -> MetadataResult<AppliedChanges>;

    /// Flip active records whose `expires_at` has passed to `expired`.
    async fn expire_due_files(
        &self,
        element_id: Option<Uuid>,
        now: OffsetDateTime,
    ) -> MetadataResult<u64>;
}
