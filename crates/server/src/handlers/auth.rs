//! Caller identity and identity provider users.

use crate::auth::{AdminUser, require_auth, require_role};
use crate::error::ApiResult;
use crate::state::AppState;
use artstore_core::{Role, map_groups_to_role, resolve_access};
use artstore_metadata::repos::RoleOverrideRepo;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;
use std::collections::HashMap;

/// GET /v1/auth/whoami - The caller as resolved from the gateway headers.
///
/// Only an identified caller is required; a caller with no role can still
/// see why access is refused.
pub async fn whoami(req: Request) -> ApiResult<Json<AdminUser>> {
    let user = require_auth(&req)?;
    Ok(Json(user.clone()))
}

/// One identity provider user with its resolved roles.
#[derive(Debug, Serialize)]
pub struct AdminUserEntry {
    pub subject_id: String,
    pub username: String,
    pub enabled: bool,
    pub groups: Vec<String>,
    pub group_role: Option<Role>,
    pub override_role: Option<Role>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct ListAdminUsersResponse {
    pub users: Vec<AdminUserEntry>,
}

/// GET /v1/admin/users - Identity provider users with group and override roles.
pub async fn list_admin_users(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ListAdminUsersResponse>> {
    require_role(&req, Role::Readonly)?;

    let identity = state.engine.accounts().identity()?;
    let overrides: HashMap<String, Role> = state
        .metadata
        .list_role_overrides()
        .await?
        .into_iter()
        .filter_map(|row| Role::parse(&row.role).ok().map(|role| (row.subject_id, role)))
        .collect();

    let auth = &state.config.auth;
    let mut users = Vec::new();
    for user in identity.list_users().await? {
        let groups = identity.list_user_groups(&user.id).await?;
        let group_role = map_groups_to_role(
            groups.as_slice(),
            auth.admin_groups.as_slice(),
            auth.readonly_groups.as_slice(),
        );
        let override_role = overrides.get(&user.id).copied();
        users.push(AdminUserEntry {
            role: resolve_access(group_role, override_role),
            subject_id: user.id,
            username: user.username,
            enabled: user.enabled,
            groups,
            group_role,
            override_role,
        });
    }
    users.sort_by(|a, b| a.username.cmp(&b.username));

    Ok(Json(ListAdminUsersResponse { users }))
}
