//! Upstream client error types.

use std::fmt;
use thiserror::Error;

/// Which remote peer a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    StorageNode,
    IdentityProvider,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageNode => f.write_str("storage node"),
            Self::IdentityProvider => f.write_str("identity provider"),
        }
    }
}

/// Upstream call errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport failure, timeout or 5xx after retries.
    #[error("{upstream} unavailable: {message}")]
    Unavailable { upstream: Upstream, message: String },

    /// The peer answered with a body that does not match the v1 contract.
    #[error("{upstream} returned an invalid response: {message}")]
    InvalidResponse { upstream: Upstream, message: String },

    /// The peer refused the request (4xx). Never retried.
    #[error("{upstream} rejected the request ({status}): {message}")]
    Rejected {
        upstream: Upstream,
        status: u16,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl UpstreamError {
    pub(crate) fn unavailable(upstream: Upstream, message: impl Into<String>) -> Self {
        Self::Unavailable {
            upstream,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(upstream: Upstream, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            upstream,
            message: message.into(),
        }
    }

    /// The peer this error is attributed to, if any.
    pub fn upstream(&self) -> Option<Upstream> {
        match self {
            Self::Unavailable { upstream, .. }
            | Self::InvalidResponse { upstream, .. }
            | Self::Rejected { upstream, .. } => Some(*upstream),
            Self::Config(_) => None,
        }
    }

    /// Whether the request was refused with the given HTTP status.
    pub fn is_rejected_with(&self, code: u16) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status == code)
    }
}

/// Result type for upstream calls.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
