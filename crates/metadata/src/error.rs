//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Whether the control-plane database itself failed, as opposed to a
    /// request being rejected by it.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            Self::Database(e) => !matches!(e, sqlx::Error::RowNotFound),
            Self::Config(_) | Self::Internal(_) => true,
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::Constraint(_) => false,
        }
    }
}

/// Classify a failed write, turning constraint failures into typed errors.
pub(crate) fn map_write_error(err: sqlx::Error, what: &str) -> MetadataError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = db_err.message();
        // SQLite error: "UNIQUE constraint failed: storage_elements.base_url"
        if msg.contains("UNIQUE constraint") {
            let column = msg.rsplit(": ").next().unwrap_or(msg);
            return MetadataError::AlreadyExists(format!("{what} ({column})"));
        }
        if msg.contains("FOREIGN KEY constraint") {
            return MetadataError::Constraint(format!("{what}: referenced row does not exist"));
        }
        if msg.contains("immutable") {
            return MetadataError::Constraint(format!("{what}: {msg}"));
        }
    }
    err.into()
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_failures_are_infrastructure() {
        assert!(MetadataError::Database(sqlx::Error::PoolClosed).is_infrastructure());
        assert!(MetadataError::Database(sqlx::Error::PoolTimedOut).is_infrastructure());
    }

    #[test]
    fn test_rejections_are_not_infrastructure() {
        assert!(!MetadataError::NotFound("x".to_string()).is_infrastructure());
        assert!(!MetadataError::AlreadyExists("x".to_string()).is_infrastructure());
        assert!(!MetadataError::Constraint("x".to_string()).is_infrastructure());
    }
}
