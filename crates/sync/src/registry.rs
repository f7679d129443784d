//! Storage Element Registry.
//!
//! Owns the catalog of storage nodes. Mode, status and capacity are only
//! ever copied from what a node reports about itself; the one value the
//! registry derives is `offline`, written when a node cannot be reached.

use crate::error::{SyncError, SyncResult};
use artstore_core::storage_element::{normalize_base_url, validate_element_name};
use artstore_core::{ElementStatus, StorageMode};
use artstore_metadata::MetadataStore;
use artstore_metadata::models::{ElementInfoUpdate, StorageElementRow};
use artstore_upstream::{NodeInfo, StorageNodeClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Registration request for a storage node.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStorageElement {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Administrative changes to a catalog entry. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageElementUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub description: Option<String>,
}

/// Summary of one info sync, stored with the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSyncStats {
    pub mode: StorageMode,
    pub status: ElementStatus,
    pub capacity_bytes: u64,
    pub used_bytes: u64,
}

impl From<&NodeInfo> for InfoSyncStats {
    fn from(info: &NodeInfo) -> Self {
        Self {
            mode: info.mode,
            status: info.status,
            capacity_bytes: info.capacity_bytes,
            used_bytes: info.used_bytes,
        }
    }
}

/// Byte counts are stored as SQLite integers.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn info_update(info: &NodeInfo) -> ElementInfoUpdate {
    ElementInfoUpdate {
        mode: info.mode.as_str().to_string(),
        status: info.status.as_str().to_string(),
        capacity_bytes: to_i64(info.capacity_bytes),
        used_bytes: to_i64(info.used_bytes),
    }
}

/// Catalog of storage nodes backed by the metadata store.
#[derive(Clone)]
pub struct StorageElementRegistry {
    metadata: Arc<dyn MetadataStore>,
    nodes: Arc<dyn StorageNodeClient>,
}

impl StorageElementRegistry {
    pub fn new(metadata: Arc<dyn MetadataStore>, nodes: Arc<dyn StorageNodeClient>) -> Self {
        Self { metadata, nodes }
    }

    /// Probe a node and create its catalog entry from what it reports.
    ///
    /// Fails with `Upstream` when the node cannot be reached and with
    /// `Conflict` when the name, address or reported id is already known.
    pub async fn register(&self, request: NewStorageElement) -> SyncResult<StorageElementRow> {
        validate_element_name(&request.name)?;
        let base_url = normalize_base_url(&request.base_url)?;

        let info = self.nodes.fetch_info(&base_url).await?;
        if info.element_id.trim().is_empty() {
            return Err(SyncError::Conflict(format!(
                "node at {base_url} reports an empty element id"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let row = StorageElementRow {
            element_id: Uuid::new_v4(),
            reported_id: info.element_id.clone(),
            name: request.name,
            base_url,
            description: request.description,
            mode: info.mode.as_str().to_string(),
            status: info.status.as_str().to_string(),
            capacity_bytes: to_i64(info.capacity_bytes),
            used_bytes: to_i64(info.used_bytes),
            last_info_sync_at: Some(now),
            last_file_sync_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.metadata
            .create_storage_element(&row)
            .await
            .map_err(SyncError::from_write)?;

        tracing::info!(
            element_id = %row.element_id,
            reported_id = %row.reported_id,
            base_url = %row.base_url,
            mode = %row.mode,
            "storage element registered"
        );
        Ok(row)
    }

    pub async fn list(&self) -> SyncResult<Vec<StorageElementRow>> {
        Ok(self.metadata.list_storage_elements().await?)
    }

    pub async fn get(&self, element_id: Uuid) -> SyncResult<StorageElementRow> {
        self.metadata
            .get_storage_element(element_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("storage element {element_id}")))
    }

    /// Change name, description or address.
    ///
    /// A new address is probed first and must serve the same node, so an
    /// update can move an element but never swap it for another one.
    pub async fn update(
        &self,
        element_id: Uuid,
        update: StorageElementUpdate,
    ) -> SyncResult<StorageElementRow> {
        let mut row = self.get(element_id).await?;

        if let Some(name) = update.name {
            validate_element_name(&name)?;
            row.name = name;
        }
        if let Some(description) = update.description {
            row.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(base_url) = update.base_url {
            let base_url = normalize_base_url(&base_url)?;
            if base_url != row.base_url {
                let info = self.nodes.fetch_info(&base_url).await?;
                if info.element_id != row.reported_id {
                    return Err(SyncError::Conflict(format!(
                        "node at {base_url} reports element id {}, expected {}",
                        info.element_id, row.reported_id
                    )));
                }
                row.base_url = base_url;
            }
        }

        row.updated_at = OffsetDateTime::now_utc();
        self.metadata
            .update_storage_element(&row)
            .await
            .map_err(SyncError::from_write)?;
        Ok(row)
    }

    /// Remove a catalog entry. Refused while file records reference it.
    pub async fn delete(&self, element_id: Uuid) -> SyncResult<()> {
        self.metadata
            .delete_storage_element(element_id)
            .await
            .map_err(SyncError::from_write)?;
        tracing::info!(element_id = %element_id, "storage element deleted");
        Ok(())
    }

    /// Re-query a node's info endpoint and record the snapshot.
    ///
    /// An unreachable node is marked offline and the upstream error is
    /// returned. A node answering with a different identity is treated the
    /// same way and reported as a conflict.
    pub async fn sync_info(&self, element: &StorageElementRow) -> SyncResult<InfoSyncStats> {
        let info = match self.nodes.fetch_info(&element.base_url).await {
            Ok(info) => info,
            Err(e) => {
                self.mark_unreachable(element.element_id, &e.to_string())
                    .await?;
                return Err(e.into());
            }
        };

        if info.element_id != element.reported_id {
            let message = format!(
                "node at {} now reports element id {}, expected {}",
                element.base_url, info.element_id, element.reported_id
            );
            self.mark_unreachable(element.element_id, &message).await?;
            return Err(SyncError::Conflict(message));
        }

        self.metadata
            .record_element_info(
                element.element_id,
                &info_update(&info),
                OffsetDateTime::now_utc(),
            )
            .await?;

        tracing::debug!(
            element_id = %element.element_id,
            mode = %info.mode,
            status = %info.status,
            used_bytes = info.used_bytes,
            "storage element info synced"
        );
        Ok(InfoSyncStats::from(&info))
    }

    /// Record a failed probe: status becomes `offline`, everything else keeps
    /// its last reported value.
    ///
    /// Only a database failure is returned. An element deleted while its
    /// probe was in flight is logged and otherwise ignored, so the probe's
    /// own error is the one reported.
    pub async fn mark_unreachable(&self, element_id: Uuid, error: &str) -> SyncResult<()> {
        tracing::warn!(element_id = %element_id, error, "storage element unreachable");
        match self
            .metadata
            .mark_element_unreachable(element_id, error, OffsetDateTime::now_utc())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_infrastructure() => Err(e.into()),
            Err(e) => {
                tracing::warn!(element_id = %element_id, error = %e, "could not mark storage element offline");
                Ok(())
            }
        }
    }
}
