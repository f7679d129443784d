//! Role override endpoints.
//!
//! An override can only raise a subject's role above what its groups grant;
//! the effective role is always the maximum of the two.

use crate::auth::require_role;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, read_json};
use crate::state::AppState;
use artstore_core::Role;
use artstore_metadata::models::RoleOverrideRow;
use artstore_metadata::repos::RoleOverrideRepo;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Longest accepted subject id.
const MAX_SUBJECT_ID_LEN: usize = 255;

#[derive(Debug, Serialize)]
pub struct RoleOverrideResponse {
    pub override_id: String,
    pub subject_id: String,
    pub role: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<RoleOverrideRow> for RoleOverrideResponse {
    type Error = ApiError;

    fn try_from(row: RoleOverrideRow) -> ApiResult<Self> {
        Ok(Self {
            override_id: row.override_id.to_string(),
            subject_id: row.subject_id,
            role: row.role,
            created_by: row.created_by,
            created_at: format_timestamp(row.created_at)?,
            updated_at: format_timestamp(row.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ListRoleOverridesResponse {
    pub role_overrides: Vec<RoleOverrideResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleOverrideRequest {
    pub subject_id: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleOverrideRequest {
    pub role: Role,
}

fn validate_subject_id(subject_id: &str) -> ApiResult<()> {
    if subject_id.trim().is_empty() {
        return Err(ApiError::Validation("subject_id cannot be empty".to_string()));
    }
    if subject_id.len() > MAX_SUBJECT_ID_LEN {
        return Err(ApiError::Validation(format!(
            "subject_id cannot exceed {MAX_SUBJECT_ID_LEN} characters"
        )));
    }
    Ok(())
}

async fn load_override(state: &AppState, subject_id: &str) -> ApiResult<RoleOverrideRow> {
    state
        .metadata
        .get_role_override(subject_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("role override for {subject_id}")))
}

/// GET /v1/role-overrides
pub async fn list_role_overrides(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ListRoleOverridesResponse>> {
    require_role(&req, Role::Readonly)?;

    let role_overrides = state
        .metadata
        .list_role_overrides()
        .await?
        .into_iter()
        .map(RoleOverrideResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(ListRoleOverridesResponse { role_overrides }))
}

/// POST /v1/role-overrides - Grant a role to a subject.
pub async fn create_role_override(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<RoleOverrideResponse>)> {
    let created_by = require_role(&req, Role::Admin)?.subject_id.clone();
    let body: CreateRoleOverrideRequest = read_json(req).await?;
    let subject_id = body.subject_id.trim().to_string();
    validate_subject_id(&subject_id)?;

    let now = OffsetDateTime::now_utc();
    let row = RoleOverrideRow {
        override_id: Uuid::new_v4(),
        subject_id,
        role: body.role.as_str().to_string(),
        created_by,
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_role_override(&row).await?;
    tracing::info!(subject_id = %row.subject_id, role = %row.role, created_by = %row.created_by, "role override created");

    Ok((StatusCode::CREATED, Json(row.try_into()?)))
}

/// GET /v1/role-overrides/{subject_id}
pub async fn get_role_override(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    req: Request,
) -> ApiResult<Json<RoleOverrideResponse>> {
    require_role(&req, Role::Readonly)?;

    let row = load_override(&state, &subject_id).await?;
    Ok(Json(row.try_into()?))
}

/// PUT /v1/role-overrides/{subject_id} - Change the granted role.
pub async fn update_role_override(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    req: Request,
) -> ApiResult<Json<RoleOverrideResponse>> {
    require_role(&req, Role::Admin)?;
    let body: UpdateRoleOverrideRequest = read_json(req).await?;

    state
        .metadata
        .update_role_override(&subject_id, body.role.as_str(), OffsetDateTime::now_utc())
        .await?;
    tracing::info!(subject_id = %subject_id, role = %body.role, "role override updated");

    let row = load_override(&state, &subject_id).await?;
    Ok(Json(row.try_into()?))
}

/// DELETE /v1/role-overrides/{subject_id}
pub async fn delete_role_override(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_role(&req, Role::Admin)?;

    state.metadata.delete_role_override(&subject_id).await?;
    tracing::info!(subject_id = %subject_id, "role override deleted");
    Ok(StatusCode::NO_CONTENT)
}
