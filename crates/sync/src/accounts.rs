//! Service Account Reconciler.
//!
//! Reconciles local service accounts with the identity provider's
//! service-account clients in both directions. Neither side is ever deleted
//! by reconciliation; removal is an explicit administrative action.
//!
//! For accounts present on both sides the local record is authoritative for
//! scopes and the enabled flag, which are pushed to the remote client.
//!
//! Administrative changes take the same fence key as a reconciliation pass,
//! so a pass never works from a listing that an admin change has outdated.

use crate::error::{SyncError, SyncResult};
use crate::fence::{FenceGuard, IDENTITY_TARGET, SyncFence};
use crate::metrics::{self, SERVICE_ACCOUNTS_RECONCILED};
use artstore_core::{AccountSource, AccountStatus, SyncKind, normalize_scopes, validate_client_id};
use artstore_metadata::MetadataStore;
use artstore_metadata::models::ServiceAccountRow;
use artstore_upstream::{ClientSpec, IdentityProvider, ServiceClient};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Counts of one service-account reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSyncStats {
    /// Local rows created for clients known only to the identity provider.
    pub created_local: u64,
    /// Remote clients created for local accounts.
    pub created_remote: u64,
    /// Remote clients whose scopes or enabled flag were pushed.
    pub updated: u64,
    /// Local accounts linked to an existing remote client of the same name.
    pub linked: u64,
    /// Accounts that could not be reconciled in this pass.
    pub failed: u64,
}

/// Creation request for a local service account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceAccount {
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Administrative changes to a service account. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceAccountUpdate {
    pub scopes: Option<Vec<String>>,
    pub status: Option<AccountStatus>,
    pub description: Option<String>,
}

/// A freshly issued secret. It is returned once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSecret {
    pub account_id: Uuid,
    pub client_id: String,
    pub client_secret: String,
    #[serde(with = "time::serde::rfc3339")]
    pub rotated_at: OffsetDateTime,
}

/// SHA-256 hex digest of a client secret.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn client_spec(account: &ServiceAccountRow) -> ClientSpec {
    ClientSpec {
        client_id: account.client_id.clone(),
        scopes: account.scope_list(),
        enabled: account.status == AccountStatus::Active.as_str(),
        description: account.description.clone(),
    }
}

fn sorted(scopes: &[String]) -> Vec<String> {
    let mut scopes = scopes.to_vec();
    scopes.sort();
    scopes.dedup();
    scopes
}

/// Keep fatal errors, count everything else as a per-account failure.
fn isolate(err: SyncError, stats: &mut AccountSyncStats, client_id: &str) -> SyncResult<()> {
    if err.is_fatal() {
        return Err(err);
    }
    tracing::warn!(client_id, error = %err, "service account reconciliation failed");
    stats.failed += 1;
    Ok(())
}

/// Reconciles service accounts and serves their administrative operations.
#[derive(Clone)]
pub struct ServiceAccountReconciler {
    metadata: Arc<dyn MetadataStore>,
    identity: Option<Arc<dyn IdentityProvider>>,
    fence: SyncFence,
}

impl ServiceAccountReconciler {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        identity: Option<Arc<dyn IdentityProvider>>,
        fence: SyncFence,
    ) -> Self {
        Self {
            metadata,
            identity,
            fence,
        }
    }

    /// Fails with [`SyncError::InProgress`] while a pass is running.
    fn exclusive(&self) -> SyncResult<FenceGuard> {
        self.fence
            .try_acquire(SyncKind::ServiceAccounts, IDENTITY_TARGET)
    }

    pub fn is_configured(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> SyncResult<&Arc<dyn IdentityProvider>> {
        self.identity.as_ref().ok_or(SyncError::IdentityNotConfigured)
    }

    /// Run one bidirectional pass.
    ///
    /// Failing to list remote clients fails the pass. Per-account failures
    /// are counted in `failed` and do not stop the pass; only a local
    /// database failure does. The account sync timestamp advances only
    /// when every account reconciled.
    pub async fn reconcile(&self) -> SyncResult<AccountSyncStats> {
        let identity = self.identity()?;
        let remote = identity.list_service_clients().await?;
        let local = self.metadata.list_service_accounts().await?;

        let remote_by_name: HashMap<&str, &ServiceClient> =
            remote.iter().map(|c| (c.client_id.as_str(), c)).collect();
        let local_names: HashSet<&str> = local.iter().map(|a| a.client_id.as_str()).collect();

        let mut stats = AccountSyncStats::default();

        for client in &remote {
            if local_names.contains(client.client_id.as_str()) {
                continue;
            }
            match self.import_remote(client).await {
                Ok(()) => stats.created_local += 1,
                Err(e) => isolate(e, &mut stats, &client.client_id)?,
            }
        }

        for account in &local {
            let result = match remote_by_name.get(account.client_id.as_str()) {
                Some(client) => self.align_remote(identity, account, client, &mut stats).await,
                None => self.export_local(identity, account, &mut stats).await,
            };
            if let Err(e) = result {
                isolate(e, &mut stats, &account.client_id)?;
            }
        }

        metrics::record_changes(&SERVICE_ACCOUNTS_RECONCILED, "created_local", stats.created_local);
        metrics::record_changes(&SERVICE_ACCOUNTS_RECONCILED, "created_remote", stats.created_remote);
        metrics::record_changes(&SERVICE_ACCOUNTS_RECONCILED, "updated", stats.updated);
        metrics::record_changes(&SERVICE_ACCOUNTS_RECONCILED, "linked", stats.linked);
        metrics::record_changes(&SERVICE_ACCOUNTS_RECONCILED, "failed", stats.failed);

        if stats.failed == 0 {
            self.metadata
                .touch_sync_state(SyncKind::ServiceAccounts, OffsetDateTime::now_utc())
                .await?;
        }

        tracing::info!(
            remote_clients = remote.len(),
            local_accounts = local.len(),
            created_local = stats.created_local,
            created_remote = stats.created_remote,
            updated = stats.updated,
            failed = stats.failed,
            "service accounts reconciled"
        );
        Ok(stats)
    }

    /// Create a local row for a client that only exists remotely.
    async fn import_remote(&self, client: &ServiceClient) -> SyncResult<()> {
        validate_client_id(&client.client_id)?;
        let scopes = normalize_scopes(&client.scopes)?;
        let now = OffsetDateTime::now_utc();
        let status = if client.enabled {
            AccountStatus::Active
        } else {
            AccountStatus::Suspended
        };

        let row = ServiceAccountRow {
            account_id: Uuid::new_v4(),
            client_id: client.client_id.clone(),
            idp_client_id: Some(client.idp_id.clone()),
            description: None,
            scopes: ServiceAccountRow::encode_scopes(&scopes),
            status: status.as_str().to_string(),
            source: AccountSource::IdentityProvider.as_str().to_string(),
            secret_hash: None,
            secret_rotated_at: None,
            last_synced_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        self.metadata
            .create_service_account(&row)
            .await
            .map_err(SyncError::from_write)?;
        tracing::info!(client_id = %row.client_id, "service account imported from identity provider");
        Ok(())
    }

    /// Both sides know the account: link it if needed, then push local scopes
    /// and enabled flag when they differ.
    async fn align_remote(
        &self,
        identity: &Arc<dyn IdentityProvider>,
        account: &ServiceAccountRow,
        client: &ServiceClient,
        stats: &mut AccountSyncStats,
    ) -> SyncResult<()> {
        let now = OffsetDateTime::now_utc();
        if account.idp_client_id.as_deref() != Some(client.idp_id.as_str()) {
            self.metadata
                .set_idp_client_id(account.account_id, &client.idp_id, now)
                .await
                .map_err(SyncError::from_write)?;
            stats.linked += 1;
        }

        let spec = client_spec(account);
        if sorted(&client.scopes) != spec.scopes || client.enabled != spec.enabled {
            identity.update_client(&client.idp_id, &spec).await?;
            stats.updated += 1;
            tracing::debug!(client_id = %account.client_id, "pushed local scopes to identity provider");
        }

        self.metadata
            .mark_account_synced(account.account_id, now)
            .await?;
        Ok(())
    }

    /// The account is absent remotely. Locally created accounts get a remote
    /// client; imported ones are left alone, since a client vanishing on the
    /// provider is not a reason to delete anything here.
    async fn export_local(
        &self,
        identity: &Arc<dyn IdentityProvider>,
        account: &ServiceAccountRow,
        stats: &mut AccountSyncStats,
    ) -> SyncResult<()> {
        if account.source != AccountSource::Local.as_str() {
            return Ok(());
        }
        let idp_id = identity.create_client(&client_spec(account)).await?;
        self.metadata
            .set_idp_client_id(account.account_id, &idp_id, OffsetDateTime::now_utc())
            .await
            .map_err(SyncError::from_write)?;
        stats.created_remote += 1;
        tracing::info!(client_id = %account.client_id, idp_id = %idp_id, "service account created on identity provider");
        Ok(())
    }

    pub async fn list(&self) -> SyncResult<Vec<ServiceAccountRow>> {
        Ok(self.metadata.list_service_accounts().await?)
    }

    pub async fn get(&self, account_id: Uuid) -> SyncResult<ServiceAccountRow> {
        self.metadata
            .get_service_account(account_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("service account {account_id}")))
    }

    /// Create a local account. When the identity provider is configured the
    /// client is created there right away; if that fails the next pass
    /// retries it.
    pub async fn create(&self, request: NewServiceAccount) -> SyncResult<ServiceAccountRow> {
        validate_client_id(&request.client_id)?;
        let scopes = normalize_scopes(&request.scopes)?;
        let _guard = self.exclusive()?;
        let now = OffsetDateTime::now_utc();

        let row = ServiceAccountRow {
            account_id: Uuid::new_v4(),
            client_id: request.client_id,
            idp_client_id: None,
            description: request.description.filter(|d| !d.is_empty()),
            scopes: ServiceAccountRow::encode_scopes(&scopes),
            status: AccountStatus::Active.as_str().to_string(),
            source: AccountSource::Local.as_str().to_string(),
            secret_hash: None,
            secret_rotated_at: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        self.metadata
            .create_service_account(&row)
            .await
            .map_err(SyncError::from_write)?;

        if let Some(identity) = &self.identity {
            match identity.create_client(&client_spec(&row)).await {
                Ok(idp_id) => {
                    self.metadata
                        .set_idp_client_id(row.account_id, &idp_id, OffsetDateTime::now_utc())
                        .await
                        .map_err(SyncError::from_write)?;
                }
                Err(e) => {
                    tracing::warn!(
                        client_id = %row.client_id,
                        error = %e,
                        "could not create client on identity provider, deferring to next sync"
                    );
                }
            }
        }

        self.get(row.account_id).await
    }

    /// Update scopes, status or description. Linked accounts have their
    /// scopes and enabled flag pushed immediately; a failed push is retried
    /// by the next pass.
    pub async fn update(
        &self,
        account_id: Uuid,
        update: ServiceAccountUpdate,
    ) -> SyncResult<ServiceAccountRow> {
        let _guard = self.exclusive()?;
        let mut row = self.get(account_id).await?;
        if let Some(scopes) = update.scopes {
            row.scopes = ServiceAccountRow::encode_scopes(&normalize_scopes(&scopes)?);
        }
        if let Some(status) = update.status {
            row.status = status.as_str().to_string();
        }
        if let Some(description) = update.description {
            row.description = Some(description).filter(|d| !d.is_empty());
        }
        row.updated_at = OffsetDateTime::now_utc();
        self.metadata
            .update_service_account(&row)
            .await
            .map_err(SyncError::from_write)?;

        if let (Some(identity), Some(idp_id)) = (&self.identity, &row.idp_client_id) {
            match identity.update_client(idp_id, &client_spec(&row)).await {
                Ok(()) => {
                    self.metadata
                        .mark_account_synced(account_id, OffsetDateTime::now_utc())
                        .await?;
                }
                Err(e) => {
                    tracing::warn!(
                        client_id = %row.client_id,
                        error = %e,
                        "could not push account update to identity provider, deferring to next sync"
                    );
                }
            }
        }

        self.get(account_id).await
    }

    /// Explicit removal. A linked remote client is deleted first so that a
    /// failure leaves both sides in place.
    pub async fn delete(&self, account_id: Uuid) -> SyncResult<()> {
        let _guard = self.exclusive()?;
        let row = self.get(account_id).await?;
        if let Some(idp_id) = &row.idp_client_id {
            let identity = self.identity()?;
            match identity.delete_client(idp_id).await {
                Ok(()) => {}
                Err(e) if e.is_rejected_with(404) => {
                    tracing::debug!(client_id = %row.client_id, "remote client already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.metadata
            .delete_service_account(account_id)
            .await
            .map_err(SyncError::from_write)?;
        tracing::info!(client_id = %row.client_id, "service account deleted");
        Ok(())
    }

    /// Issue a new client secret. Only its hash is stored.
    pub async fn rotate_secret(&self, account_id: Uuid) -> SyncResult<IssuedSecret> {
        let _guard = self.exclusive()?;
        let row = self.get(account_id).await?;
        let identity = self.identity()?;
        let Some(idp_id) = &row.idp_client_id else {
            return Err(SyncError::Conflict(format!(
                "service account {} is not linked to an identity provider client yet",
                row.client_id
            )));
        };

        let secret = identity.regenerate_secret(idp_id).await?;
        let rotated_at = OffsetDateTime::now_utc();
        self.metadata
            .record_secret_rotation(account_id, &hash_secret(&secret), rotated_at)
            .await
            .map_err(SyncError::from_write)?;
        tracing::info!(client_id = %row.client_id, "service account secret rotated");

        Ok(IssuedSecret {
            account_id,
            client_id: row.client_id,
            client_secret: secret,
            rotated_at,
        })
    }
}
