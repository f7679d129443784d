//! File record vocabulary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a file record.
///
/// Transitions are one-directional: `active` may become `deleted` or
/// `expired`, and neither terminal state changes again through
/// reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Active,
    Deleted,
    Expired,
}

impl FileStatus {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            "expired" => Ok(Self::Expired),
            _ => Err(Error::invalid("file status", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Whether a reconciliation pass may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Deleted) | (Self::Active, Self::Expired)
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention policy attached to a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Kept until its TTL passes.
    Temporary,
    #[default]
    Permanent,
}

impl RetentionPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "temporary" => Ok(Self::Temporary),
            "permanent" => Ok(Self::Permanent),
            _ => Err(Error::invalid("retention policy", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Permanent => "permanent",
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_leave_active() {
        assert!(FileStatus::Active.can_transition_to(FileStatus::Deleted));
        assert!(FileStatus::Active.can_transition_to(FileStatus::Expired));
        assert!(!FileStatus::Deleted.can_transition_to(FileStatus::Active));
        assert!(!FileStatus::Expired.can_transition_to(FileStatus::Active));
        assert!(!FileStatus::Deleted.can_transition_to(FileStatus::Expired));
        assert!(!FileStatus::Active.can_transition_to(FileStatus::Active));
    }

    #[test]
    fn retention_defaults_to_permanent() {
        assert_eq!(RetentionPolicy::default(), RetentionPolicy::Permanent);
        assert_eq!(
            RetentionPolicy::parse("temporary").unwrap(),
            RetentionPolicy::Temporary
        );
    }
}
