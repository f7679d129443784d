//! Role override repository.

use crate::error::MetadataResult;
use crate::models::RoleOverrideRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for role overrides, keyed by identity provider subject id.
#[async_trait]
pub trait RoleOverrideRepo: Send + Sync {
    async fn create_role_override(&self, row: &RoleOverrideRow) -> MetadataResult<()>;

    async fn get_role_override(&self, subject_id: &str) -> MetadataResult<Option<RoleOverrideRow>>;

    async fn list_role_overrides(&self) -> MetadataResult<Vec<RoleOverrideRow>>;

    async fn update_role_override(
        &self,
        subject_id: &str,
        role: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    async fn delete_role_override(&self, subject_id: &str) -> MetadataResult<()>;
}
