//! Identity provider status and forced account sync.

use crate::auth::require_role;
use crate::error::ApiResult;
use crate::handlers::common::format_optional;
use crate::handlers::sync::ForceSyncResponse;
use crate::state::AppState;
use artstore_core::{Role, SyncKind};
use artstore_sync::SyncTarget;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IdpStatusResponse {
    /// Whether an identity provider is configured at all.
    pub configured: bool,
    /// Result of a token probe; absent when not configured.
    pub reachable: Option<bool>,
    pub error: Option<String>,
    pub last_account_sync_at: Option<String>,
}

/// GET /v1/idp/status
pub async fn get_idp_status(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<IdpStatusResponse>> {
    require_role(&req, Role::Readonly)?;

    let last_account_sync_at = format_optional(state.engine.sync_state().await?.last_account_sync_at)?;
    let accounts = state.engine.accounts();
    if !accounts.is_configured() {
        return Ok(Json(IdpStatusResponse {
            configured: false,
            reachable: None,
            error: None,
            last_account_sync_at,
        }));
    }

    let (reachable, error) = match accounts.identity()?.probe().await {
        Ok(()) => (true, None),
        Err(e) => {
            tracing::warn!(error = %e, "identity provider probe failed");
            (false, Some(e.to_string()))
        }
    };

    Ok(Json(IdpStatusResponse {
        configured: true,
        reachable: Some(reachable),
        error,
        last_account_sync_at,
    }))
}

/// POST /v1/idp/sync - Force a service account reconciliation.
pub async fn sync_idp(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ForceSyncResponse>> {
    require_role(&req, Role::Admin)?;

    let run = state
        .engine
        .trigger(SyncKind::ServiceAccounts, SyncTarget::IdentityProvider)
        .await?;
    Ok(Json(ForceSyncResponse::executed(run)))
}
