//! Sync kinds and run outcomes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three reconciliation kinds driven by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Capacity, status and mode snapshot of each storage element.
    StorageInfo,
    /// File listing of each storage element against the file registry.
    FileRegistry,
    /// Service accounts against the identity provider's client registry.
    ServiceAccounts,
}

impl SyncKind {
    pub const ALL: [SyncKind; 3] = [Self::StorageInfo, Self::FileRegistry, Self::ServiceAccounts];

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "storage_info" => Ok(Self::StorageInfo),
            "file_registry" => Ok(Self::FileRegistry),
            "service_accounts" => Ok(Self::ServiceAccounts),
            _ => Err(Error::invalid("sync kind", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageInfo => "storage_info",
            Self::FileRegistry => "file_registry",
            Self::ServiceAccounts => "service_accounts",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed sync run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

impl RunOutcome {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(Error::invalid("run outcome", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
