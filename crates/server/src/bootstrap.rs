//! Startup role grants.

use anyhow::{Context, Result};
use artstore_core::Role;
use artstore_core::config::AuthConfig;
use artstore_metadata::MetadataStore;
use artstore_metadata::models::RoleOverrideRow;
use artstore_metadata::repos::RoleOverrideRepo;
use time::OffsetDateTime;
use uuid::Uuid;

/// Marker stored in `created_by` for grants made here.
pub const BOOTSTRAP_CREATOR: &str = "bootstrap";

/// Grant `admin` to every configured bootstrap subject that has no override yet.
///
/// Existing overrides are left untouched, so an operator can later demote
/// a bootstrap admin without it being re-granted on restart. Returns the
/// number of overrides created.
pub async fn ensure_bootstrap_admins(
    metadata: &dyn MetadataStore,
    config: &AuthConfig,
) -> Result<usize> {
    let mut created = 0;
    for subject_id in &config.bootstrap_admins {
        let subject_id = subject_id.trim();
        if let Some(existing) = metadata
            .get_role_override(subject_id)
            .await
            .with_context(|| format!("failed to look up role override for {subject_id}"))?
        {
            tracing::debug!(subject_id = %subject_id, role = %existing.role, "bootstrap admin already has an override");
            continue;
        }

        let now = OffsetDateTime::now_utc();
        let row = RoleOverrideRow {
            override_id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            role: Role::Admin.as_str().to_string(),
            created_by: BOOTSTRAP_CREATOR.to_string(),
            created_at: now,
            updated_at: now,
        };
        metadata
            .create_role_override(&row)
            .await
            .with_context(|| format!("failed to grant bootstrap admin to {subject_id}"))?;
        tracing::info!(subject_id = %subject_id, "bootstrap admin override created");
        created += 1;
    }
    Ok(created)
}
