//! Database models mapping to the catalog schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Storage elements
// =============================================================================

/// Catalog entry for one storage node.
///
/// `mode` and `status` hold whatever the node last reported, except that the
/// registry writes `offline` when the node cannot be reached.
#[derive(Debug, Clone, FromRow)]
pub struct StorageElementRow {
    pub element_id: Uuid,
    /// Identifier the node reports about itself from its info endpoint.
    pub reported_id: String,
    pub name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub mode: String,
    pub status: String,
    pub capacity_bytes: i64,
    pub used_bytes: i64,
    pub last_info_sync_at: Option<OffsetDateTime>,
    pub last_file_sync_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Snapshot from a storage node's info endpoint.
#[derive(Debug, Clone)]
pub struct ElementInfoUpdate {
    pub mode: String,
    pub status: String,
    pub capacity_bytes: i64,
    pub used_bytes: i64,
}

// =============================================================================
// File registry
// =============================================================================

/// File record.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_id: Uuid,
    pub storage_element_id: Uuid,
    pub filename: Option<String>,
    /// Immutable once set (enforced by a trigger).
    pub checksum: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub retention_policy: String,
    pub expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Filter for file listings.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub storage_element_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// In-place update of a file record computed by reconciliation.
#[derive(Debug, Clone)]
pub struct FileUpdate {
    pub file_id: Uuid,
    /// Written only when the stored checksum is unset.
    pub checksum: Option<String>,
    pub size_bytes: i64,
    pub status: String,
}

/// All writes of one file reconciliation run for one storage element.
#[derive(Debug, Clone, Default)]
pub struct FileChangeSet {
    pub inserts: Vec<FileRow>,
    pub updates: Vec<FileUpdate>,
    /// Active records to flip to `deleted`.
    pub tombstones: Vec<Uuid>,
}

impl FileChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.tombstones.is_empty()
    }
}

/// Row counts actually written by [`FileRepo::apply_file_changes`].
///
/// [`FileRepo::apply_file_changes`]: crate::repos::FileRepo::apply_file_changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub inserted: u64,
    pub updated: u64,
    pub tombstoned: u64,
    /// Active records whose `expires_at` had passed.
    pub expired: u64,
    /// Inserts skipped because the file id already exists (under another element).
    pub insert_conflicts: u64,
}

// =============================================================================
// Service accounts
// =============================================================================

/// Service account record.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceAccountRow {
    pub account_id: Uuid,
    pub client_id: String,
    /// Internal id of the linked client at the identity provider.
    pub idp_client_id: Option<String>,
    pub description: Option<String>,
    /// JSON array of normalized scopes.
    pub scopes: String,
    pub status: String,
    pub source: String,
    /// SHA-256 hex of the last issued secret. The secret itself is never stored.
    pub secret_hash: Option<String>,
    pub secret_rotated_at: Option<OffsetDateTime>,
    pub last_synced_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ServiceAccountRow {
    /// Decode the scope list.
    pub fn scope_list(&self) -> Vec<String> {
        serde_json::from_str(&self.scopes).unwrap_or_default()
    }

    /// Encode a scope list for the `scopes` column.
    pub fn encode_scopes(scopes: &[String]) -> String {
        serde_json::to_string(scopes).unwrap_or_else(|_| "[]".to_string())
    }
}

// =============================================================================
// Role overrides
// =============================================================================

/// Locally stored role grant for an identity provider subject.
#[derive(Debug, Clone, FromRow)]
pub struct RoleOverrideRow {
    pub override_id: Uuid,
    pub subject_id: String,
    pub role: String,
    pub created_by: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Sync state and run history
// =============================================================================

/// Singleton row with the last successful time of each sync kind.
#[derive(Debug, Clone, FromRow)]
pub struct SyncStateRow {
    pub id: i64,
    pub last_storage_sync_at: Option<OffsetDateTime>,
    pub last_file_sync_at: Option<OffsetDateTime>,
    pub last_account_sync_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

/// Completed sync run. Written once, never updated.
#[derive(Debug, Clone, FromRow)]
pub struct SyncRunRow {
    pub run_id: Uuid,
    pub sync_kind: String,
    /// Storage element id, or `None` for the identity provider target.
    pub target_id: Option<String>,
    pub outcome: String,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub stats_json: Option<String>,
    pub error: Option<String>,
}
