//! Service account endpoints.

use crate::auth::require_role;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_optional, format_timestamp, parse_id, read_json};
use crate::state::AppState;
use artstore_core::Role;
use artstore_metadata::models::ServiceAccountRow;
use artstore_sync::{IssuedSecret, NewServiceAccount, ServiceAccountUpdate};
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use serde::Serialize;

/// A service account as returned by the API. The secret hash is never
/// exposed; `has_secret` tells whether one was ever issued.
#[derive(Debug, Serialize)]
pub struct ServiceAccountResponse {
    pub account_id: String,
    pub client_id: String,
    pub idp_client_id: Option<String>,
    pub description: Option<String>,
    pub scopes: Vec<String>,
    pub status: String,
    pub source: String,
    pub has_secret: bool,
    pub secret_rotated_at: Option<String>,
    pub last_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ServiceAccountRow> for ServiceAccountResponse {
    type Error = ApiError;

    fn try_from(row: ServiceAccountRow) -> ApiResult<Self> {
        Ok(Self {
            scopes: row.scope_list(),
            account_id: row.account_id.to_string(),
            client_id: row.client_id,
            idp_client_id: row.idp_client_id,
            description: row.description,
            status: row.status,
            source: row.source,
            has_secret: row.secret_hash.is_some(),
            secret_rotated_at: format_optional(row.secret_rotated_at)?,
            last_synced_at: format_optional(row.last_synced_at)?,
            created_at: format_timestamp(row.created_at)?,
            updated_at: format_timestamp(row.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ListServiceAccountsResponse {
    pub service_accounts: Vec<ServiceAccountResponse>,
}

/// GET /v1/service-accounts
pub async fn list_service_accounts(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ListServiceAccountsResponse>> {
    require_role(&req, Role::Readonly)?;

    let service_accounts = state
        .engine
        .accounts()
        .list()
        .await?
        .into_iter()
        .map(ServiceAccountResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(ListServiceAccountsResponse { service_accounts }))
}

/// POST /v1/service-accounts - Create a local account.
pub async fn create_service_account(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<ServiceAccountResponse>)> {
    require_role(&req, Role::Admin)?;
    let body: NewServiceAccount = read_json(req).await?;

    let row = state.engine.accounts().create(body).await?;
    Ok((StatusCode::CREATED, Json(row.try_into()?)))
}

/// GET /v1/service-accounts/{id}
pub async fn get_service_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ServiceAccountResponse>> {
    require_role(&req, Role::Readonly)?;
    let account_id = parse_id("service account", &account_id)?;

    let row = state.engine.accounts().get(account_id).await?;
    Ok(Json(row.try_into()?))
}

/// PUT /v1/service-accounts/{id} - Change scopes, status or description.
pub async fn update_service_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ServiceAccountResponse>> {
    require_role(&req, Role::Admin)?;
    let account_id = parse_id("service account", &account_id)?;
    let body: ServiceAccountUpdate = read_json(req).await?;

    let row = state.engine.accounts().update(account_id, body).await?;
    Ok(Json(row.try_into()?))
}

/// DELETE /v1/service-accounts/{id} - Remove the account on both sides.
pub async fn delete_service_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_role(&req, Role::Admin)?;
    let account_id = parse_id("service account", &account_id)?;

    state.engine.accounts().delete(account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/service-accounts/{id}/rotate-secret - Issue a new secret.
///
/// The secret is in this response only.
pub async fn rotate_service_account_secret(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    req: Request,
) -> ApiResult<Json<IssuedSecret>> {
    require_role(&req, Role::Admin)?;
    let account_id = parse_id("service account", &account_id)?;

    let issued = state.engine.accounts().rotate_secret(account_id).await?;
    Ok(Json(issued))
}
