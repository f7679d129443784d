//! Storage element catalog endpoints.

use crate::auth::require_role;
use crate::error::ApiResult;
use crate::handlers::common::{format_optional, format_timestamp, parse_id, read_json};
use crate::handlers::sync::ForceSyncResponse;
use crate::state::AppState;
use artstore_core::{Role, SyncKind};
use artstore_metadata::models::StorageElementRow;
use artstore_sync::{NewStorageElement, StorageElementUpdate, SyncTarget};
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StorageElementResponse {
    pub element_id: String,
    pub reported_id: String,
    pub name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub mode: String,
    pub status: String,
    pub capacity_bytes: i64,
    pub used_bytes: i64,
    pub last_info_sync_at: Option<String>,
    pub last_file_sync_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<StorageElementRow> for StorageElementResponse {
    type Error = crate::error::ApiError;

    fn try_from(row: StorageElementRow) -> ApiResult<Self> {
        Ok(Self {
            element_id: row.element_id.to_string(),
            reported_id: row.reported_id,
            name: row.name,
            base_url: row.base_url,
            description: row.description,
            mode: row.mode,
            status: row.status,
            capacity_bytes: row.capacity_bytes,
            used_bytes: row.used_bytes,
            last_info_sync_at: format_optional(row.last_info_sync_at)?,
            last_file_sync_at: format_optional(row.last_file_sync_at)?,
            last_error: row.last_error,
            created_at: format_timestamp(row.created_at)?,
            updated_at: format_timestamp(row.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ListStorageElementsResponse {
    pub storage_elements: Vec<StorageElementResponse>,
}

/// POST /v1/storage-elements - Register a storage node after probing it.
pub async fn register_storage_element(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<StorageElementResponse>)> {
    require_role(&req, Role::Admin)?;
    let body: NewStorageElement = read_json(req).await?;

    let row = state.engine.registry().register(body).await?;
    Ok((StatusCode::CREATED, Json(row.try_into()?)))
}

/// GET /v1/storage-elements - List the catalog.
pub async fn list_storage_elements(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ListStorageElementsResponse>> {
    require_role(&req, Role::Readonly)?;

    let storage_elements = state
        .engine
        .registry()
        .list()
        .await?
        .into_iter()
        .map(StorageElementResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(ListStorageElementsResponse { storage_elements }))
}

/// GET /v1/storage-elements/{id}
pub async fn get_storage_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    req: Request,
) -> ApiResult<Json<StorageElementResponse>> {
    require_role(&req, Role::Readonly)?;
    let element_id = parse_id("storage element", &element_id)?;

    let row = state.engine.registry().get(element_id).await?;
    Ok(Json(row.try_into()?))
}

/// PUT /v1/storage-elements/{id} - Rename, describe or move an element.
pub async fn update_storage_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    req: Request,
) -> ApiResult<Json<StorageElementResponse>> {
    require_role(&req, Role::Admin)?;
    let element_id = parse_id("storage element", &element_id)?;
    let body: StorageElementUpdate = read_json(req).await?;

    let row = state.engine.registry().update(element_id, body).await?;
    Ok(Json(row.try_into()?))
}

/// DELETE /v1/storage-elements/{id} - Refused while file records reference it.
pub async fn delete_storage_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_role(&req, Role::Admin)?;
    let element_id = parse_id("storage element", &element_id)?;

    state.engine.registry().delete(element_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/storage-elements/{id}/sync - Force an info sync of one element.
pub async fn sync_storage_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ForceSyncResponse>> {
    require_role(&req, Role::Admin)?;
    let element_id = parse_id("storage element", &element_id)?;

    let run = state
        .engine
        .trigger(SyncKind::StorageInfo, SyncTarget::Element(element_id))
        .await?;
    Ok(Json(ForceSyncResponse::executed(run)))
}

/// POST /v1/storage-elements/{id}/files/sync - Force file reconciliation of one element.
pub async fn sync_storage_element_files(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ForceSyncResponse>> {
    require_role(&req, Role::Admin)?;
    let element_id = parse_id("storage element", &element_id)?;

    let run = state
        .engine
        .trigger(SyncKind::FileRegistry, SyncTarget::Element(element_id))
        .await?;
    Ok(Json(ForceSyncResponse::executed(run)))
}
