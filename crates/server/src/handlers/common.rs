//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::extract::Request;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Maximum request body size for JSON endpoints.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Read and decode a JSON request body.
pub async fn read_json<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Validation(format!("invalid JSON: {e}")))
}

/// Parse a UUID path segment.
pub fn parse_id(what: &str, value: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| ApiError::Validation(format!("invalid {what} id: {e}")))
}

pub fn format_timestamp(ts: OffsetDateTime) -> ApiResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))
}

pub fn format_optional(ts: Option<OffsetDateTime>) -> ApiResult<Option<String>> {
    ts.map(format_timestamp).transpose()
}
