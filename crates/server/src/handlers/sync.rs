//! Sync state and run history endpoints.

use crate::auth::require_role;
use crate::error::ApiResult;
use crate::handlers::common::{format_optional, format_timestamp};
use crate::state::AppState;
use artstore_core::{Role, SyncKind};
use artstore_sync::{LoopState, RunSummary};
use axum::Json;
use axum::extract::{Query, Request, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of a forced sync. A force sync that could not run is an error
/// (`conflict` while the target is fenced), never a response with
/// `executed: false`.
#[derive(Debug, Serialize)]
pub struct ForceSyncResponse {
    pub executed: bool,
    pub run: RunSummary,
}

impl ForceSyncResponse {
    pub fn executed(run: RunSummary) -> Self {
        Self {
            executed: true,
            run,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStateResponse {
    pub last_storage_sync_at: Option<String>,
    pub last_file_sync_at: Option<String>,
    pub last_account_sync_at: Option<String>,
    pub updated_at: String,
    /// Periodic loop state per sync kind.
    pub loops: BTreeMap<SyncKind, LoopState>,
}

/// GET /v1/sync/state - Last successful sync times and scheduler loop states.
pub async fn get_sync_state(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<SyncStateResponse>> {
    require_role(&req, Role::Readonly)?;

    let row = state.engine.sync_state().await?;
    Ok(Json(SyncStateResponse {
        last_storage_sync_at: format_optional(row.last_storage_sync_at)?,
        last_file_sync_at: format_optional(row.last_file_sync_at)?,
        last_account_sync_at: format_optional(row.last_account_sync_at)?,
        updated_at: format_timestamp(row.updated_at)?,
        loops: state.scheduler_status.snapshot(),
    }))
}

/// Query parameters for listing runs.
#[derive(Debug, Deserialize)]
pub struct ListRunsParams {
    pub kind: Option<String>,
    pub target: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<RunSummary>,
}

/// GET /v1/sync/runs - Recent runs, newest first.
pub async fn list_sync_runs(
    State(state): State<AppState>,
    Query(params): Query<ListRunsParams>,
    req: Request,
) -> ApiResult<Json<ListRunsResponse>> {
    require_role(&req, Role::Readonly)?;

    let kind = params.kind.as_deref().map(SyncKind::parse).transpose()?;
    let runs = state
        .engine
        .list_runs(kind, params.target.as_deref(), params.limit)
        .await?;
    Ok(Json(ListRunsResponse { runs }))
}
