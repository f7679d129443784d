//! API error types.

use artstore_core::SyncKind;
use artstore_metadata::MetadataError;
use artstore_sync::SyncError;
use artstore_upstream::{Upstream, UpstreamError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    StorageNodeUnavailable(String),

    #[error("{0}")]
    IdentityProviderUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::StorageNodeUnavailable(_) => "storage_node_unavailable",
            Self::IdentityProviderUnavailable(_) => "identity_provider_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::StorageNodeUnavailable(_) | Self::IdentityProviderUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::AlreadyExists(what) => Self::Conflict(format!("{what} already exists")),
            MetadataError::Constraint(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err.upstream() {
            Some(Upstream::StorageNode) => Self::StorageNodeUnavailable(err.to_string()),
            Some(Upstream::IdentityProvider) => Self::IdentityProviderUnavailable(err.to_string()),
            None => Self::Internal(err.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InProgress { .. } => Self::Conflict(err.to_string()),
            SyncError::Upstream(e) => e.into(),
            SyncError::Metadata(e) => e.into(),
            SyncError::Timeout { kind, .. } => match kind {
                SyncKind::ServiceAccounts => Self::IdentityProviderUnavailable(err.to_string()),
                SyncKind::StorageInfo | SyncKind::FileRegistry => {
                    Self::StorageNodeUnavailable(err.to_string())
                }
            },
            SyncError::NotFound(what) => Self::NotFound(what),
            SyncError::Conflict(msg) => Self::Conflict(msg),
            SyncError::Invalid(msg) => Self::Validation(msg),
            SyncError::IdentityNotConfigured => Self::IdentityProviderUnavailable(err.to_string()),
            SyncError::Task(msg) => Self::Internal(msg),
        }
    }
}

impl From<artstore_core::Error> for ApiError {
    fn from(err: artstore_core::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::API_ERRORS
            .with_label_values(&[self.code()])
            .inc();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
