//! File Registry Reconciler.
//!
//! A storage node is authoritative for its own file listing. Reconciling one
//! node computes a three-way diff between that listing and the local records
//! scoped to the node, then applies it in one transaction:
//!
//! - remote only: insert
//! - both, with a differing size, status or newly known checksum: update
//! - local active, remote absent: tombstone (`deleted`, row kept)
//!
//! Rows are never removed, and records in a terminal state are never moved
//! back to `active` by reconciliation. A file that reappears after being
//! tombstoned is counted and left for an administrator to [`restore`].
//!
//! [`restore`]: FileRegistryReconciler::restore

use crate::error::{SyncError, SyncResult};
use crate::metrics::{self, FILES_RECONCILED};
use crate::registry::to_i64;
use artstore_core::{FileStatus, RetentionPolicy};
use artstore_metadata::MetadataStore;
use artstore_metadata::models::{
    FileChangeSet, FileFilter, FileRow, FileUpdate, StorageElementRow,
};
use artstore_upstream::{RemoteFile, StorageNodeClient};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Largest page an administrative listing may request.
pub const MAX_LIST_LIMIT: u32 = 1000;

/// Counts of one file reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSyncStats {
    pub added: u64,
    pub updated: u64,
    pub tombstoned: u64,
    /// Active records flipped to `expired` during the run.
    pub expired: u64,
    /// Remote entries that could not be applied: a checksum differing from
    /// the stored one, or a file id registered under another element.
    pub conflicts: u64,
    /// Remote active files whose local record is `deleted`.
    pub reappeared: u64,
}

/// Planned writes plus the entries the diff refused to apply.
#[derive(Debug, Clone, Default)]
pub struct FileDiff {
    pub changes: FileChangeSet,
    pub checksum_conflicts: u64,
    pub reappeared: u64,
}

/// Compute the changes that bring `local` in line with `remote`.
///
/// `local` must hold every record (any status) on `element_id`. The function
/// is pure; applying its result twice is a no-op the second time.
pub fn diff_listing(
    element_id: Uuid,
    local: &[FileRow],
    remote: &[RemoteFile],
    now: OffsetDateTime,
) -> FileDiff {
    let local_by_id: HashMap<Uuid, &FileRow> = local.iter().map(|f| (f.file_id, f)).collect();
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(remote.len());
    let mut diff = FileDiff::default();

    for entry in remote {
        if !seen.insert(entry.file_id) {
            tracing::warn!(
                element_id = %element_id,
                file_id = %entry.file_id,
                "duplicate file id in node listing, keeping first entry"
            );
            continue;
        }

        let Some(record) = local_by_id.get(&entry.file_id) else {
            diff.changes.inserts.push(new_record(element_id, entry, now));
            continue;
        };

        // Unparseable local status is treated as terminal so it is never touched.
        let local_status = FileStatus::parse(&record.status).unwrap_or(FileStatus::Deleted);
        if local_status.is_terminal() {
            if local_status == FileStatus::Deleted && entry.status == FileStatus::Active {
                diff.reappeared += 1;
            }
            continue;
        }

        let checksum = match (&record.checksum, &entry.checksum) {
            (Some(stored), Some(reported)) if stored != reported => {
                tracing::warn!(
                    element_id = %element_id,
                    file_id = %entry.file_id,
                    stored = %stored,
                    reported = %reported,
                    "node reports a different checksum for a registered file"
                );
                diff.checksum_conflicts += 1;
                continue;
            }
            (None, Some(reported)) => Some(reported.clone()),
            _ => None,
        };

        let size_bytes = to_i64(entry.size_bytes);
        if checksum.is_some() || size_bytes != record.size_bytes || entry.status != local_status {
            diff.changes.updates.push(FileUpdate {
                file_id: entry.file_id,
                checksum,
                size_bytes,
                status: entry.status.as_str().to_string(),
            });
        }
    }

    diff.changes.tombstones = local
        .iter()
        .filter(|f| f.status == FileStatus::Active.as_str() && !seen.contains(&f.file_id))
        .map(|f| f.file_id)
        .collect();

    diff
}

fn new_record(element_id: Uuid, entry: &RemoteFile, now: OffsetDateTime) -> FileRow {
    FileRow {
        file_id: entry.file_id,
        storage_element_id: element_id,
        filename: entry.filename.clone(),
        checksum: entry.checksum.clone(),
        size_bytes: to_i64(entry.size_bytes),
        status: entry.status.as_str().to_string(),
        retention_policy: entry.retention_policy.unwrap_or_default().as_str().to_string(),
        expires_at: entry.expires_at,
        created_at: now,
        updated_at: now,
        deleted_at: (entry.status == FileStatus::Deleted).then_some(now),
    }
}

/// Administrative registration of a file record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFile {
    #[serde(default)]
    pub file_id: Option<Uuid>,
    pub storage_element_id: Uuid,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    pub size_bytes: u64,
    #[serde(default)]
    pub retention_policy: RetentionPolicy,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// Retention change for an existing record.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionUpdate {
    pub retention_policy: RetentionPolicy,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

fn validate_retention(
    policy: RetentionPolicy,
    expires_at: Option<OffsetDateTime>,
) -> SyncResult<()> {
    match (policy, expires_at) {
        (RetentionPolicy::Temporary, None) => Err(SyncError::Invalid(
            "temporary retention requires expires_at".to_string(),
        )),
        (RetentionPolicy::Permanent, Some(_)) => Err(SyncError::Invalid(
            "permanent retention cannot have expires_at".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Reconciles the file registry with storage nodes and serves the
/// administrative file operations.
#[derive(Clone)]
pub struct FileRegistryReconciler {
    metadata: Arc<dyn MetadataStore>,
    nodes: Arc<dyn StorageNodeClient>,
}

impl FileRegistryReconciler {
    pub fn new(metadata: Arc<dyn MetadataStore>, nodes: Arc<dyn StorageNodeClient>) -> Self {
        Self { metadata, nodes }
    }

    /// Reconcile the records of one storage element with its node's listing.
    ///
    /// The listing is fetched before anything is written, so an unreachable
    /// node leaves the catalog untouched.
    pub async fn reconcile(&self, element: &StorageElementRow) -> SyncResult<FileSyncStats> {
        let remote = self.nodes.list_files(&element.base_url).await?;
        let local = self
            .metadata
            .list_files_for_element(element.element_id)
            .await?;

        let now = OffsetDateTime::now_utc();
        let diff = diff_listing(element.element_id, &local, &remote, now);
        let applied = self
            .metadata
            .apply_file_changes(element.element_id, &diff.changes, now)
            .await?;

        let stats = FileSyncStats {
            added: applied.inserted,
            updated: applied.updated,
            tombstoned: applied.tombstoned,
            expired: applied.expired,
            conflicts: diff.checksum_conflicts + applied.insert_conflicts,
            reappeared: diff.reappeared,
        };

        metrics::record_changes(&FILES_RECONCILED, "added", stats.added);
        metrics::record_changes(&FILES_RECONCILED, "updated", stats.updated);
        metrics::record_changes(&FILES_RECONCILED, "tombstoned", stats.tombstoned);
        metrics::record_changes(&FILES_RECONCILED, "expired", stats.expired);
        metrics::record_changes(&FILES_RECONCILED, "conflict", stats.conflicts);
        metrics::record_changes(&FILES_RECONCILED, "reappeared", stats.reappeared);

        if stats.reappeared > 0 {
            tracing::warn!(
                element_id = %element.element_id,
                reappeared = stats.reappeared,
                "deleted files reappeared on node; restore them explicitly if intended"
            );
        }
        tracing::info!(
            element_id = %element.element_id,
            remote_files = remote.len(),
            added = stats.added,
            updated = stats.updated,
            tombstoned = stats.tombstoned,
            conflicts = stats.conflicts,
            "file registry reconciled"
        );
        Ok(stats)
    }

    pub async fn list(&self, mut filter: FileFilter) -> SyncResult<Vec<FileRow>> {
        if let Some(status) = &filter.status {
            FileStatus::parse(status)?;
        }
        filter.limit = filter.limit.clamp(1, MAX_LIST_LIMIT);
        Ok(self.metadata.list_files(&filter).await?)
    }

    pub async fn get(&self, file_id: Uuid) -> SyncResult<FileRow> {
        self.metadata
            .get_file(file_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("file {file_id}")))
    }

    /// Create an active record on an existing element.
    pub async fn register(&self, request: NewFile) -> SyncResult<FileRow> {
        validate_retention(request.retention_policy, request.expires_at)?;
        if self
            .metadata
            .get_storage_element(request.storage_element_id)
            .await?
            .is_none()
        {
            return Err(SyncError::NotFound(format!(
                "storage element {}",
                request.storage_element_id
            )));
        }

        let now = OffsetDateTime::now_utc();
        let row = FileRow {
            file_id: request.file_id.unwrap_or_else(Uuid::new_v4),
            storage_element_id: request.storage_element_id,
            filename: request.filename,
            checksum: request.checksum.filter(|c| !c.is_empty()),
            size_bytes: to_i64(request.size_bytes),
            status: FileStatus::Active.as_str().to_string(),
            retention_policy: request.retention_policy.as_str().to_string(),
            expires_at: request.expires_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.metadata
            .create_file(&row)
            .await
            .map_err(SyncError::from_write)?;
        Ok(row)
    }

    /// Change retention policy and expiry. Nothing else about a record is
    /// administratively editable.
    pub async fn update_retention(
        &self,
        file_id: Uuid,
        update: RetentionUpdate,
    ) -> SyncResult<FileRow> {
        validate_retention(update.retention_policy, update.expires_at)?;
        let file = self.get(file_id).await?;
        if file.status != FileStatus::Active.as_str() {
            return Err(SyncError::Conflict(format!(
                "file {file_id} is {}",
                file.status
            )));
        }
        self.metadata
            .update_file_retention(
                file_id,
                update.retention_policy.as_str(),
                update.expires_at,
                OffsetDateTime::now_utc(),
            )
            .await
            .map_err(SyncError::from_write)?;
        self.get(file_id).await
    }

    /// Soft-delete: flip an active record to `deleted`.
    pub async fn tombstone(&self, file_id: Uuid) -> SyncResult<FileRow> {
        let file = self.get(file_id).await?;
        if !self
            .metadata
            .tombstone_file(file_id, OffsetDateTime::now_utc())
            .await?
        {
            return Err(SyncError::Conflict(format!(
                "file {file_id} is already {}",
                file.status
            )));
        }
        tracing::info!(file_id = %file_id, "file tombstoned");
        self.get(file_id).await
    }

    /// Confirm a reappeared file: flip a `deleted` record back to `active`.
    pub async fn restore(&self, file_id: Uuid) -> SyncResult<FileRow> {
        let file = self.get(file_id).await?;
        if !self
            .metadata
            .restore_file(file_id, OffsetDateTime::now_utc())
            .await?
        {
            return Err(SyncError::Conflict(format!(
                "only deleted files can be restored, file {file_id} is {}",
                file.status
            )));
        }
        tracing::info!(file_id = %file_id, "file restored");
        self.get(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: Uuid, element: Uuid, checksum: Option<&str>, status: FileStatus) -> FileRow {
        let now = OffsetDateTime::now_utc();
        FileRow {
            file_id: id,
            storage_element_id: element,
            filename: None,
            checksum: checksum.map(str::to_string),
            size_bytes: 10,
            status: status.as_str().to_string(),
            retention_policy: RetentionPolicy::Permanent.as_str().to_string(),
            expires_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn remote(id: Uuid, checksum: Option<&str>, status: FileStatus) -> RemoteFile {
        RemoteFile {
            file_id: id,
            checksum: checksum.map(str::to_string),
            size_bytes: 10,
            status,
            filename: None,
            retention_policy: None,
            expires_at: None,
        }
    }

    #[test]
    fn three_way_diff() {
        let element = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let locals = [
            local(a, element, Some("c1"), FileStatus::Active),
            local(c, element, Some("c3"), FileStatus::Active),
        ];
        let remotes = [
            remote(a, Some("c1"), FileStatus::Active),
            remote(b, Some("c2"), FileStatus::Active),
        ];

        let diff = diff_listing(element, &locals, &remotes, OffsetDateTime::now_utc());
        assert_eq!(diff.changes.inserts.len(), 1);
        assert_eq!(diff.changes.inserts[0].file_id, b);
        assert!(diff.changes.updates.is_empty());
        assert_eq!(diff.changes.tombstones, vec![c]);
    }

    #[test]
    fn checksum_is_only_filled_in() {
        let element = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let locals = [
            local(a, element, None, FileStatus::Active),
            local(b, element, Some("old"), FileStatus::Active),
        ];
        let remotes = [
            remote(a, Some("new"), FileStatus::Active),
            remote(b, Some("different"), FileStatus::Active),
        ];

        let diff = diff_listing(element, &locals, &remotes, OffsetDateTime::now_utc());
        assert_eq!(diff.changes.updates.len(), 1);
        assert_eq!(diff.changes.updates[0].file_id, a);
        assert_eq!(diff.changes.updates[0].checksum.as_deref(), Some("new"));
        assert_eq!(diff.checksum_conflicts, 1);
        assert!(diff.changes.tombstones.is_empty());
    }

    #[test]
    fn terminal_records_are_left_alone() {
        let element = Uuid::new_v4();
        let (deleted, expired) = (Uuid::new_v4(), Uuid::new_v4());
        let locals = [
            local(deleted, element, Some("c1"), FileStatus::Deleted),
            local(expired, element, Some("c2"), FileStatus::Expired),
        ];
        let remotes = [
            remote(deleted, Some("c1"), FileStatus::Active),
            remote(expired, Some("c2"), FileStatus::Deleted),
        ];

        let diff = diff_listing(element, &locals, &remotes, OffsetDateTime::now_utc());
        assert!(diff.changes.is_empty());
        assert_eq!(diff.reappeared, 1);
    }

    #[test]
    fn remote_status_change_is_an_update() {
        let element = Uuid::new_v4();
        let a = Uuid::new_v4();
        let locals = [local(a, element, Some("c1"), FileStatus::Active)];
        let remotes = [remote(a, Some("c1"), FileStatus::Expired)];

        let diff = diff_listing(element, &locals, &remotes, OffsetDateTime::now_utc());
        assert_eq!(diff.changes.updates.len(), 1);
        assert_eq!(diff.changes.updates[0].status, "expired");
        assert!(diff.changes.updates[0].checksum.is_none());
    }

    #[test]
    fn unchanged_listing_yields_no_changes() {
        let element = Uuid::new_v4();
        let a = Uuid::new_v4();
        let locals = [local(a, element, Some("c1"), FileStatus::Active)];
        let remotes = [
            remote(a, Some("c1"), FileStatus::Active),
            remote(a, Some("c1"), FileStatus::Active),
        ];

        let diff = diff_listing(element, &locals, &remotes, OffsetDateTime::now_utc());
        assert!(diff.changes.is_empty());
        assert_eq!(diff.checksum_conflicts, 0);
    }

    #[test]
    fn remote_deleted_file_is_inserted_as_tombstone() {
        let element = Uuid::new_v4();
        let a = Uuid::new_v4();
        let remotes = [remote(a, None, FileStatus::Deleted)];

        let diff = diff_listing(element, &[], &remotes, OffsetDateTime::now_utc());
        assert_eq!(diff.changes.inserts.len(), 1);
        assert_eq!(diff.changes.inserts[0].status, "deleted");
        assert!(diff.changes.inserts[0].deleted_at.is_some());
    }

    #[test]
    fn retention_requires_matching_expiry() {
        let now = OffsetDateTime::now_utc();
        assert!(validate_retention(RetentionPolicy::Temporary, None).is_err());
        assert!(validate_retention(RetentionPolicy::Permanent, Some(now)).is_err());
        assert!(validate_retention(RetentionPolicy::Temporary, Some(now)).is_ok());
        assert!(validate_retention(RetentionPolicy::Permanent, None).is_ok());
    }
}
