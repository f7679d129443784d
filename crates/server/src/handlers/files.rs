//! File registry endpoints.
//!
//! Records are never physically removed: `DELETE` tombstones a record and
//! `restore` is the explicit confirmation of a file that reappeared on its
//! node.

use crate::auth::require_role;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_optional, format_timestamp, parse_id, read_json};
use crate::state::AppState;
use artstore_core::Role;
use artstore_metadata::models::{FileFilter, FileRow};
use artstore_sync::files::MAX_LIST_LIMIT;
use artstore_sync::{NewFile, RetentionUpdate};
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Default page size of file listings.
const DEFAULT_LIST_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub file_id: String,
    pub storage_element_id: String,
    pub filename: Option<String>,
    pub checksum: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub retention_policy: String,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl TryFrom<FileRow> for FileResponse {
    type Error = ApiError;

    fn try_from(row: FileRow) -> ApiResult<Self> {
        Ok(Self {
            file_id: row.file_id.to_string(),
            storage_element_id: row.storage_element_id.to_string(),
            filename: row.filename,
            checksum: row.checksum,
            size_bytes: row.size_bytes,
            status: row.status,
            retention_policy: row.retention_policy,
            expires_at: format_optional(row.expires_at)?,
            created_at: format_timestamp(row.created_at)?,
            updated_at: format_timestamp(row.updated_at)?,
            deleted_at: format_optional(row.deleted_at)?,
        })
    }
}

/// Query parameters for listing files.
#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    pub storage_element_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileResponse>,
    pub limit: u32,
    pub offset: u32,
}

/// GET /v1/files - List records, optionally by element and status.
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListFilesParams>,
    req: Request,
) -> ApiResult<Json<ListFilesResponse>> {
    require_role(&req, Role::Readonly)?;

    let storage_element_id = params
        .storage_element_id
        .as_deref()
        .map(|id| parse_id("storage element", id))
        .transpose()?;
    let filter = FileFilter {
        storage_element_id,
        status: params.status,
        limit: params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT),
        offset: params.offset.unwrap_or(0),
    };
    let (limit, offset) = (filter.limit, filter.offset);

    let files = state
        .engine
        .files()
        .list(filter)
        .await?
        .into_iter()
        .map(FileResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(ListFilesResponse {
        files,
        limit,
        offset,
    }))
}

/// POST /v1/files - Register an active record on an existing element.
pub async fn register_file(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<FileResponse>)> {
    require_role(&req, Role::Admin)?;
    let body: NewFile = read_json(req).await?;

    let row = state.engine.files().register(body).await?;
    Ok((StatusCode::CREATED, Json(row.try_into()?)))
}

/// GET /v1/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    req: Request,
) -> ApiResult<Json<FileResponse>> {
    require_role(&req, Role::Readonly)?;
    let file_id = parse_id("file", &file_id)?;

    let row = state.engine.files().get(file_id).await?;
    Ok(Json(row.try_into()?))
}

/// PUT /v1/files/{id} - Change retention policy and expiry.
pub async fn update_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    req: Request,
) -> ApiResult<Json<FileResponse>> {
    require_role(&req, Role::Admin)?;
    let file_id = parse_id("file", &file_id)?;
    let body: RetentionUpdate = read_json(req).await?;

    let row = state.engine.files().update_retention(file_id, body).await?;
    Ok(Json(row.try_into()?))
}

/// DELETE /v1/files/{id} - Tombstone a record.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    req: Request,
) -> ApiResult<Json<FileResponse>> {
    require_role(&req, Role::Admin)?;
    let file_id = parse_id("file", &file_id)?;

    let row = state.engine.files().tombstone(file_id).await?;
    Ok(Json(row.try_into()?))
}

/// POST /v1/files/{id}/restore - Flip a deleted record back to active.
pub async fn restore_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    req: Request,
) -> ApiResult<Json<FileResponse>> {
    require_role(&req, Role::Admin)?;
    let file_id = parse_id("file", &file_id)?;

    let row = state.engine.files().restore(file_id).await?;
    Ok(Json(row.try_into()?))
}
