//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
