//! Reconciliation engine error types.

use artstore_core::SyncKind;
use artstore_metadata::MetadataError;
use artstore_upstream::UpstreamError;
use thiserror::Error;

/// Errors raised by the registry, the reconcilers and the scheduler.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another reconciliation of the same target holds the fence.
    #[error("{kind} sync already in progress for {target}")]
    InProgress { kind: SyncKind, target: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("{kind} sync of {target} timed out after {secs}s")]
    Timeout {
        kind: SyncKind,
        target: String,
        secs: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("identity provider is not configured")]
    IdentityNotConfigured,

    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether the control-plane database itself failed. Only such errors
    /// stop a scheduler loop; everything else is a per-target failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Metadata(e) => e.is_infrastructure(),
            _ => false,
        }
    }

    /// Translate a rejected catalog write into a domain error, keeping
    /// infrastructure failures as they are.
    pub(crate) fn from_write(err: MetadataError) -> Self {
        match err {
            MetadataError::AlreadyExists(what) => Self::Conflict(format!("{what} already exists")),
            MetadataError::Constraint(msg) => Self::Conflict(msg),
            MetadataError::NotFound(what) => Self::NotFound(what),
            other => Self::Metadata(other),
        }
    }
}

impl From<artstore_core::Error> for SyncError {
    fn from(err: artstore_core::Error) -> Self {
        Self::Invalid(err.to_string())
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
