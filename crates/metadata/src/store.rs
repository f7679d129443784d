//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    FileRepo, RoleOverrideRepo, ServiceAccountRepo, StorageElementRepo, SyncRunRepo,
    SyncStateRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    StorageElementRepo
    + FileRepo
    + ServiceAccountRepo
    + RoleOverrideRepo
    + SyncStateRepo
    + SyncRunRepo
    + Send
    + Sync
{
    /// Apply the schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) a store and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let busy_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            // A single connection serialises writers; reconciliation transactions
            // never interleave.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl std::convert::From<std::io::Error> for crate::MetadataError {
    fn from(e: std::io::Error) -> Self {
        crate::MetadataError::Config(e.to_string())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::error::map_write_error;
    use crate::models::*;
    use artstore_core::SyncKind;
    use sqlx::{QueryBuilder, Transaction};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn sync_state_column(kind: SyncKind) -> &'static str {
        match kind {
            SyncKind::StorageInfo => "last_storage_sync_at",
            SyncKind::FileRegistry => "last_file_sync_at",
            SyncKind::ServiceAccounts => "last_account_sync_at",
        }
    }

    async fn touch_sync_state_tx(
        tx: &mut Transaction<'_, Sqlite>,
        kind: SyncKind,
        at: OffsetDateTime,
    ) -> MetadataResult<()> {
        let sql = format!(
            "UPDATE sync_state SET {} = ?, updated_at = ? WHERE id = 1",
            sync_state_column(kind)
        );
        sqlx::query(&sql)
            .bind(at)
            .bind(at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn expire_due_tx(
        tx: &mut Transaction<'_, Sqlite>,
        element_id: Option<Uuid>,
        now: OffsetDateTime,
    ) -> MetadataResult<u64> {
        // Compare in Rust: stored timestamps are text.
        let candidates: Vec<(Uuid, Option<OffsetDateTime>)> = match element_id {
            Some(id) => sqlx::query_as(
                "SELECT file_id, expires_at FROM file_registry \
                 WHERE storage_element_id = ? AND status = 'active' AND expires_at IS NOT NULL",
            )
            .bind(id)
            .fetch_all(&mut **tx)
            .await?,
            None => sqlx::query_as(
                "SELECT file_id, expires_at FROM file_registry \
                 WHERE status = 'active' AND expires_at IS NOT NULL",
            )
            .fetch_all(&mut **tx)
            .await?,
        };

        let mut expired = 0;
        for (file_id, expires_at) in candidates {
            if expires_at.is_some_and(|at| at <= now) {
                let result = sqlx::query(
                    "UPDATE file_registry SET status = 'expired', updated_at = ? \
                     WHERE file_id = ? AND status = 'active'",
                )
                .bind(now)
                .bind(file_id)
                .execute(&mut **tx)
                .await?;
                expired += result.rows_affected();
            }
        }
        Ok(expired)
    }

    #[async_trait]
    impl StorageElementRepo for SqliteStore {
        async fn create_storage_element(&self, element: &StorageElementRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO storage_elements (element_id, reported_id, name, base_url, description,
                    mode, status, capacity_bytes, used_bytes, last_info_sync_at, last_file_sync_at,
                    last_error, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(element.element_id)
            .bind(&element.reported_id)
            .bind(&element.name)
            .bind(&element.base_url)
            .bind(&element.description)
            .bind(&element.mode)
            .bind(&element.status)
            .bind(element.capacity_bytes)
            .bind(element.used_bytes)
            .bind(element.last_info_sync_at)
            .bind(element.last_file_sync_at)
            .bind(&element.last_error)
            .bind(element.created_at)
            .bind(element.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "storage element"))?;
            Ok(())
        }

        async fn get_storage_element(
            &self,
            element_id: Uuid,
        ) -> MetadataResult<Option<StorageElementRow>> {
            let row = sqlx::query_as::<_, StorageElementRow>(
                "SELECT * FROM storage_elements WHERE element_id = ?",
            )
            .bind(element_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_storage_element_by_reported_id(
            &self,
            reported_id: &str,
        ) -> MetadataResult<Option<StorageElementRow>> {
            let row = sqlx::query_as::<_, StorageElementRow>(
                "SELECT * FROM storage_elements WHERE reported_id = ?",
            )
            .bind(reported_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_storage_elements(&self) -> MetadataResult<Vec<StorageElementRow>> {
            let rows = sqlx::query_as::<_, StorageElementRow>(
                "SELECT * FROM storage_elements ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_storage_element(&self, element: &StorageElementRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE storage_elements SET name = ?, base_url = ?, description = ?, updated_at = ? \
                 WHERE element_id = ?",
            )
            .bind(&element.name)
            .bind(&element.base_url)
            .bind(&element.description)
            .bind(element.updated_at)
            .bind(element.element_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "storage element"))?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "storage element {}",
                    element.element_id
                )));
            }
            Ok(())
        }

        async fn record_element_info(
            &self,
            element_id: Uuid,
            info: &ElementInfoUpdate,
            synced_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE storage_elements
                SET mode = ?, status = ?, capacity_bytes = ?, used_bytes = ?,
                    last_info_sync_at = ?, last_error = NULL, updated_at = ?
                WHERE element_id = ?
                "#,
            )
            .bind(&info.mode)
            .bind(&info.status)
            .bind(info.capacity_bytes)
            .bind(info.used_bytes)
            .bind(synced_at)
            .bind(synced_at)
            .bind(element_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "storage element {element_id}"
                )));
            }

            touch_sync_state_tx(&mut tx, SyncKind::StorageInfo, synced_at).await?;
            tx.commit().await?;
            Ok(())
        }

        async fn mark_element_unreachable(
            &self,
            element_id: Uuid,
            error: &str,
            at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE storage_elements SET status = 'offline', last_error = ?, updated_at = ? \
                 WHERE element_id = ?",
            )
            .bind(error)
            .bind(at)
            .bind(element_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "storage element {element_id}"
                )));
            }
            Ok(())
        }

        async fn delete_storage_element(&self, element_id: Uuid) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            // Check inside the transaction so a concurrent insert cannot slip in.
            let file_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM file_registry WHERE storage_element_id = ?",
            )
            .bind(element_id)
            .fetch_one(&mut *tx)
            .await?;

            if file_count > 0 {
                return Err(MetadataError::Constraint(format!(
                    "cannot delete storage element with {file_count} file record(s)"
                )));
            }

            let result = sqlx::query("DELETE FROM storage_elements WHERE element_id = ?")
                .bind(element_id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "storage element {element_id}"
                )));
            }

            tx.commit().await?;
            Ok(())
        }

        async fn count_files_for_element(&self, element_id: Uuid) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM file_registry WHERE storage_element_id = ?",
            )
            .bind(element_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn create_file(&self, file: &FileRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO file_registry (file_id, storage_element_id, filename, checksum,
                    size_bytes, status, retention_policy, expires_at, created_at, updated_at, deleted_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(file.file_id)
            .bind(file.storage_element_id)
            .bind(&file.filename)
            .bind(&file.checksum)
            .bind(file.size_bytes)
            .bind(&file.status)
            .bind(&file.retention_policy)
            .bind(file.expires_at)
            .bind(file.created_at)
            .bind(file.updated_at)
            .bind(file.deleted_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "file"))?;
            Ok(())
        }

        async fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM file_registry WHERE file_id = ?")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_files(&self, filter: &FileFilter) -> MetadataResult<Vec<FileRow>> {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM file_registry WHERE 1 = 1");
            if let Some(element_id) = filter.storage_element_id {
                qb.push(" AND storage_element_id = ").push_bind(element_id);
            }
            if let Some(status) = &filter.status {
                qb.push(" AND status = ").push_bind(status.clone());
            }
            qb.push(" ORDER BY created_at, file_id LIMIT ")
                .push_bind(i64::from(filter.limit))
                .push(" OFFSET ")
                .push_bind(i64::from(filter.offset));

            let rows = qb.build_query_as::<FileRow>().fetch_all(&self.pool).await?;
            Ok(rows)
        }

        async fn list_files_for_element(&self, element_id: Uuid) -> MetadataResult<Vec<FileRow>> {
            let rows = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM file_registry WHERE storage_element_id = ?",
            )
            .bind(element_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_file_retention(
            &self,
            file_id: Uuid,
            retention_policy: &str,
            expires_at: Option<OffsetDateTime>,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE file_registry SET retention_policy = ?, expires_at = ?, updated_at = ? \
                 WHERE file_id = ?",
            )
            .bind(retention_policy)
            .bind(expires_at)
            .bind(updated_at)
            .bind(file_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("file {file_id}")));
            }
            Ok(())
        }

        async fn tombstone_file(&self, file_id: Uuid, at: OffsetDateTime) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE file_registry SET status = 'deleted', deleted_at = ?, updated_at = ? \
                 WHERE file_id = ? AND status = 'active'",
            )
            .bind(at)
            .bind(at)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn restore_file(&self, file_id: Uuid, at: OffsetDateTime) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE file_registry SET status = 'active', deleted_at = NULL, updated_at = ? \
                 WHERE file_id = ? AND status = 'deleted'",
            )
            .bind(at)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn apply_file_changes(
            &self,
            element_id: Uuid,
            changes: &FileChangeSet,
            synced_at: OffsetDateTime,
        ) -> MetadataResult<AppliedChanges> {
            let mut tx = self.pool.begin().await?;
            let mut applied = AppliedChanges::default();

            for file in &changes.inserts {
                // A file id registered under another element is a conflict, not a failure.
                let result = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO file_registry (file_id, storage_element_id, filename,
                        checksum, size_bytes, status, retention_policy, expires_at, created_at,
                        updated_at, deleted_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(file.file_id)
                .bind(element_id)
                .bind(&file.filename)
                .bind(&file.checksum)
                .bind(file.size_bytes)
                .bind(&file.status)
                .bind(&file.retention_policy)
                .bind(file.expires_at)
                .bind(file.created_at)
                .bind(file.updated_at)
                .bind(file.deleted_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(e, "file"))?;

                if result.rows_affected() == 0 {
                    applied.insert_conflicts += 1;
                } else {
                    applied.inserted += 1;
                }
            }

            for update in &changes.updates {
                // The status guard keeps transitions one-directional even if the
                // caller computed a stale diff.
                let result = sqlx::query(
                    r#"
                    UPDATE file_registry
                    SET checksum = COALESCE(checksum, ?),
                        size_bytes = ?,
                        status = ?,
                        deleted_at = CASE WHEN ? = 'deleted' THEN COALESCE(deleted_at, ?) ELSE deleted_at END,
                        updated_at = ?
                    WHERE file_id = ? AND storage_element_id = ?
                      AND (status = 'active' OR status = ?)
                    "#,
                )
                .bind(&update.checksum)
                .bind(update.size_bytes)
                .bind(&update.status)
                .bind(&update.status)
                .bind(synced_at)
                .bind(synced_at)
                .bind(update.file_id)
                .bind(element_id)
                .bind(&update.status)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(e, "file"))?;
                applied.updated += result.rows_affected();
            }

            for file_id in &changes.tombstones {
                let result = sqlx::query(
                    "UPDATE file_registry SET status = 'deleted', deleted_at = ?, updated_at = ? \
                     WHERE file_id = ? AND storage_element_id = ? AND status = 'active'",
                )
                .bind(synced_at)
                .bind(synced_at)
                .bind(file_id)
                .bind(element_id)
                .execute(&mut *tx)
                .await?;
                applied.tombstoned += result.rows_affected();
            }

            applied.expired = expire_due_tx(&mut tx, Some(element_id), synced_at).await?;

            let result = sqlx::query(
                "UPDATE storage_elements SET last_file_sync_at = ?, updated_at = ? WHERE element_id = ?",
            )
            .bind(synced_at)
            .bind(synced_at)
            .bind(element_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "storage element {element_id}"
                )));
            }

            touch_sync_state_tx(&mut tx, SyncKind::FileRegistry, synced_at).await?;
            tx.commit().await?;
            Ok(applied)
        }

        async fn expire_due_files(
            &self,
            element_id: Option<Uuid>,
            now: OffsetDateTime,
        ) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;
            let expired = expire_due_tx(&mut tx, element_id, now).await?;
            tx.commit().await?;
            Ok(expired)
        }
    }

    #[async_trait]
    impl ServiceAccountRepo for SqliteStore {
        async fn create_service_account(&self, account: &ServiceAccountRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO service_accounts (account_id, client_id, idp_client_id, description,
                    scopes, status, source, secret_hash, secret_rotated_at, last_synced_at,
                    created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(account.account_id)
            .bind(&account.client_id)
            .bind(&account.idp_client_id)
            .bind(&account.description)
            .bind(&account.scopes)
            .bind(&account.status)
            .bind(&account.source)
            .bind(&account.secret_hash)
            .bind(account.secret_rotated_at)
            .bind(account.last_synced_at)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "service account"))?;
            Ok(())
        }

        async fn get_service_account(
            &self,
            account_id: Uuid,
        ) -> MetadataResult<Option<ServiceAccountRow>> {
            let row = sqlx::query_as::<_, ServiceAccountRow>(
                "SELECT * FROM service_accounts WHERE account_id = ?",
            )
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_service_account_by_client_id(
            &self,
            client_id: &str,
        ) -> MetadataResult<Option<ServiceAccountRow>> {
            let row = sqlx::query_as::<_, ServiceAccountRow>(
                "SELECT * FROM service_accounts WHERE client_id = ?",
            )
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_service_accounts(&self) -> MetadataResult<Vec<ServiceAccountRow>> {
            let rows = sqlx::query_as::<_, ServiceAccountRow>(
                "SELECT * FROM service_accounts ORDER BY client_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_service_account(&self, account: &ServiceAccountRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE service_accounts SET description = ?, scopes = ?, status = ?, updated_at = ? \
                 WHERE account_id = ?",
            )
            .bind(&account.description)
            .bind(&account.scopes)
            .bind(&account.status)
            .bind(account.updated_at)
            .bind(account.account_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "service account {}",
                    account.account_id
                )));
            }
            Ok(())
        }

        async fn set_idp_client_id(
            &self,
            account_id: Uuid,
            idp_client_id: &str,
            synced_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE service_accounts SET idp_client_id = ?, last_synced_at = ?, updated_at = ? \
                 WHERE account_id = ?",
            )
            .bind(idp_client_id)
            .bind(synced_at)
            .bind(synced_at)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "service account"))?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "service account {account_id}"
                )));
            }
            Ok(())
        }

        async fn mark_account_synced(
            &self,
            account_id: Uuid,
            synced_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE service_accounts SET last_synced_at = ? WHERE account_id = ?")
                .bind(synced_at)
                .bind(account_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn record_secret_rotation(
            &self,
            account_id: Uuid,
            secret_hash: &str,
            rotated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE service_accounts SET secret_hash = ?, secret_rotated_at = ?, updated_at = ? \
                 WHERE account_id = ?",
            )
            .bind(secret_hash)
            .bind(rotated_at)
            .bind(rotated_at)
            .bind(account_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "service account {account_id}"
                )));
            }
            Ok(())
        }

        async fn delete_service_account(&self, account_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM service_accounts WHERE account_id = ?")
                .bind(account_id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "service account {account_id}"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RoleOverrideRepo for SqliteStore {
        async fn create_role_override(&self, row: &RoleOverrideRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO role_overrides (override_id, subject_id, role, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.override_id)
            .bind(&row.subject_id)
            .bind(&row.role)
            .bind(&row.created_by)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "role override"))?;
            Ok(())
        }

        async fn get_role_override(
            &self,
            subject_id: &str,
        ) -> MetadataResult<Option<RoleOverrideRow>> {
            let row = sqlx::query_as::<_, RoleOverrideRow>(
                "SELECT * FROM role_overrides WHERE subject_id = ?",
            )
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_role_overrides(&self) -> MetadataResult<Vec<RoleOverrideRow>> {
            let rows = sqlx::query_as::<_, RoleOverrideRow>(
                "SELECT * FROM role_overrides ORDER BY subject_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_role_override(
            &self,
            subject_id: &str,
            role: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE role_overrides SET role = ?, updated_at = ? WHERE subject_id = ?",
            )
            .bind(role)
            .bind(updated_at)
            .bind(subject_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "role override for {subject_id}"
                )));
            }
            Ok(())
        }

        async fn delete_role_override(&self, subject_id: &str) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM role_overrides WHERE subject_id = ?")
                .bind(subject_id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "role override for {subject_id}"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SyncStateRepo for SqliteStore {
        async fn get_sync_state(&self) -> MetadataResult<SyncStateRow> {
            let row = sqlx::query_as::<_, SyncStateRow>("SELECT * FROM sync_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
            row.ok_or_else(|| MetadataError::Internal("sync_state row is missing".to_string()))
        }

        async fn touch_sync_state(&self, kind: SyncKind, at: OffsetDateTime) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            touch_sync_state_tx(&mut tx, kind, at).await?;
            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl SyncRunRepo for SqliteStore {
        async fn record_sync_run(&self, run: &SyncRunRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO sync_runs (run_id, sync_kind, target_id, outcome, started_at,
                    finished_at, stats_json, error)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run.run_id)
            .bind(&run.sync_kind)
            .bind(&run.target_id)
            .bind(&run.outcome)
            .bind(run.started_at)
            .bind(run.finished_at)
            .bind(&run.stats_json)
            .bind(&run.error)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "sync run"))?;
            Ok(())
        }

        async fn list_sync_runs(
            &self,
            kind: Option<&str>,
            target_id: Option<&str>,
            limit: u32,
        ) -> MetadataResult<Vec<SyncRunRow>> {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM sync_runs WHERE 1 = 1");
            if let Some(kind) = kind {
                qb.push(" AND sync_kind = ").push_bind(kind.to_string());
            }
            if let Some(target_id) = target_id {
                qb.push(" AND target_id = ").push_bind(target_id.to_string());
            }
            qb.push(" ORDER BY rowid DESC LIMIT ")
                .push_bind(i64::from(limit));

            let rows = qb
                .build_query_as::<SyncRunRow>()
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS storage_elements (
    element_id BLOB PRIMARY KEY,
    reported_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL UNIQUE,
    base_url TEXT NOT NULL UNIQUE,
    description TEXT,
    mode TEXT NOT NULL CHECK (mode IN ('edit', 'rw', 'ro', 'ar')),
    status TEXT NOT NULL CHECK (status IN ('online', 'offline', 'degraded', 'maintenance')),
    capacity_bytes INTEGER NOT NULL DEFAULT 0,
    used_bytes INTEGER NOT NULL DEFAULT 0,
    last_info_sync_at TEXT,
    last_file_sync_at TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_registry (
    file_id BLOB PRIMARY KEY,
    storage_element_id BLOB NOT NULL REFERENCES storage_elements(element_id),
    filename TEXT,
    checksum TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('active', 'deleted', 'expired')),
    retention_policy TEXT NOT NULL DEFAULT 'permanent'
        CHECK (retention_policy IN ('temporary', 'permanent')),
    expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_file_registry_element ON file_registry(storage_element_id);
CREATE INDEX IF NOT EXISTS idx_file_registry_status ON file_registry(status);

CREATE TRIGGER IF NOT EXISTS trg_file_registry_checksum_immutable
BEFORE UPDATE OF checksum ON file_registry
WHEN OLD.checksum IS NOT NULL AND NEW.checksum IS NOT OLD.checksum
BEGIN
    SELECT RAISE(ABORT, 'file checksum is immutable');
END;

CREATE TABLE IF NOT EXISTS service_accounts (
    account_id BLOB PRIMARY KEY,
    client_id TEXT NOT NULL UNIQUE,
    idp_client_id TEXT UNIQUE,
    description TEXT,
    scopes TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL CHECK (status IN ('active', 'suspended')),
    source TEXT NOT NULL CHECK (source IN ('local', 'identity_provider')),
    secret_hash TEXT,
    secret_rotated_at TEXT,
    last_synced_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_overrides (
    override_id BLOB PRIMARY KEY,
    subject_id TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL CHECK (role IN ('readonly', 'admin')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_storage_sync_at TEXT,
    last_file_sync_at TEXT,
    last_account_sync_at TEXT,
    updated_at TEXT NOT NULL
);
INSERT OR IGNORE INTO sync_state (id, updated_at) VALUES (1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'));

CREATE TABLE IF NOT EXISTS sync_runs (
    run_id BLOB PRIMARY KEY,
    sync_kind TEXT NOT NULL,
    target_id TEXT,
    outcome TEXT NOT NULL CHECK (outcome IN ('succeeded', 'failed')),
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    stats_json TEXT,
    error TEXT
);
CREATE INDEX IF NOT EXISTS idx_sync_runs_kind_target ON sync_runs(sync_kind, target_id);
"#;
