//! Gateway identity and authorization middleware.
//!
//! Interactive users are authenticated by the gateway in front of the
//! server. It forwards the verified identity in `X-Auth-Subject`,
//! `X-Auth-Username` and `X-Auth-Groups`; this module turns those headers
//! into an [`AdminUser`] carrying the effective role.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use artstore_core::{Role, map_groups_to_role, resolve_access};
use artstore_metadata::repos::RoleOverrideRepo;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

pub const SUBJECT_HEADER: &str = "x-auth-subject";
pub const USERNAME_HEADER: &str = "x-auth-username";
pub const GROUPS_HEADER: &str = "x-auth-groups";
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping at most
    /// MAX_TRACE_ID_LEN printable ASCII characters.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caller as resolved from the gateway headers.
#[derive(Clone, Debug, Serialize)]
pub struct AdminUser {
    pub subject_id: String,
    pub username: Option<String>,
    pub groups: Vec<String>,
    /// Role implied by group membership alone.
    pub group_role: Option<Role>,
    /// Locally stored override, if any.
    pub override_role: Option<Role>,
    /// `max(group_role, override_role)`.
    pub role: Option<Role>,
}

impl AdminUser {
    /// Require at least `needed`. A caller with no role at all is forbidden.
    pub fn require_role(&self, needed: Role) -> ApiResult<()> {
        match self.role {
            Some(role) if role >= needed => Ok(()),
            Some(role) => Err(ApiError::Forbidden(format!(
                "role {role} is not sufficient, {needed} required"
            ))),
            None => Err(ApiError::Forbidden(
                "no role assigned to this subject".to_string(),
            )),
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_groups(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// SHA-256 hex of a gateway token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether the request was forwarded by the trusted gateway.
fn gateway_trusted(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.config.auth.gateway_token_hash else {
        return true;
    };
    header(headers, GATEWAY_TOKEN_HEADER)
        .map(|token| hash_token(token).eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<AdminUser>> {
    let Some(subject_id) = header(headers, SUBJECT_HEADER) else {
        return Ok(None);
    };

    if !gateway_trusted(state, headers) {
        tracing::warn!(subject_id = %subject_id, "identity headers without a valid gateway token, ignoring");
        return Ok(None);
    }

    let groups = parse_groups(header(headers, GROUPS_HEADER));
    let auth = &state.config.auth;
    let group_role = map_groups_to_role(
        groups.as_slice(),
        auth.admin_groups.as_slice(),
        auth.readonly_groups.as_slice(),
    );

    let override_role = match state.metadata.get_role_override(subject_id).await? {
        Some(row) => match Role::parse(&row.role) {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(subject_id = %subject_id, error = %e, "stored role override is invalid, ignoring");
                None
            }
        },
        None => None,
    };

    Ok(Some(AdminUser {
        subject_id: subject_id.to_string(),
        username: header(headers, USERNAME_HEADER).map(str::to_string),
        groups,
        group_role,
        override_role,
        role: resolve_access(group_role, override_role),
    }))
}

/// Resolve the caller and run the request inside a span carrying the trace id.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let user = resolve_user(&state, req.headers()).await?;
    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require an identified caller.
pub fn require_auth(req: &Request) -> ApiResult<&AdminUser> {
    req.extensions()
        .get::<AdminUser>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

/// Require an identified caller holding at least `needed`.
pub fn require_role(req: &Request, needed: Role) -> ApiResult<&AdminUser> {
    let user = require_auth(req)?;
    user.require_role(needed)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_is_sanitized_and_truncated() {
        let id = TraceId::from_client(&format!("abc\n{}", "x".repeat(300)));
        assert!(id.as_str().starts_with("abc"));
        assert!(!id.as_str().contains('\n'));
        assert!(id.as_str().len() <= MAX_TRACE_ID_LEN);

        let id = TraceId::from_client("\n\t");
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_groups_header_is_comma_separated() {
        assert_eq!(
            parse_groups(Some(" artstore-admins, ,/ops ")),
            vec!["artstore-admins".to_string(), "/ops".to_string()]
        );
        assert!(parse_groups(None).is_empty());
    }

    #[test]
    fn test_no_role_is_forbidden() {
        let user = AdminUser {
            subject_id: "s".to_string(),
            username: None,
            groups: Vec::new(),
            group_role: None,
            override_role: None,
            role: None,
        };
        assert!(matches!(
            user.require_role(Role::Readonly),
            Err(ApiError::Forbidden(_))
        ));

        let reader = AdminUser {
            role: Some(Role::Readonly),
            ..user
        };
        assert!(reader.require_role(Role::Readonly).is_ok());
        assert!(matches!(
            reader.require_role(Role::Admin),
            Err(ApiError::Forbidden(_))
        ));
    }
}
