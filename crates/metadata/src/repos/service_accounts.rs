//! Service account repository.

use crate::error::MetadataResult;
use crate::models::ServiceAccountRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for service accounts.
#[async_trait]
pub trait ServiceAccountRepo: Send + Sync {
    async fn create_service_account(&self, account: &ServiceAccountRow) -> MetadataResult<()>;

    async fn get_service_account(&self, account_id: Uuid)
    -> MetadataResult<Option<ServiceAccountRow>>;

    async fn get_service_account_by_client_id(
        &self,
        client_id: &str,
    ) -> MetadataResult<Option<ServiceAccountRow>>;

    async fn list_service_accounts(&self) -> MetadataResult<Vec<ServiceAccountRow>>;

    /// Update description, scopes and status.
    async fn update_service_account(&self, account: &ServiceAccountRow) -> MetadataResult<()>;

    /// Link an account to its identity provider client.
    async fn set_idp_client_id(
        &self,
        account_id: Uuid,
        idp_client_id: &str,
        synced_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    async fn mark_account_synced(
        &self,
        account_id: Uuid,
        synced_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Store the hash of a freshly issued secret.
    async fn record_secret_rotation(
        &self,
        account_id: Uuid,
        secret_hash: &str,
        rotated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    async fn delete_service_account(&self, account_id: Uuid) -> MetadataResult<()>;
}
