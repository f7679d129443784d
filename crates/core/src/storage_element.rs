//! Storage element vocabulary.
//!
//! Mode and status are owned by the storage node. The control plane stores
//! whatever the node last reported and only ever derives `offline` itself,
//! when the node cannot be reached.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode reported by a storage node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Full editing: upload, update and delete.
    Edit,
    /// Read-write: upload and read, no deletion.
    Rw,
    /// Read-only.
    Ro,
    /// Archive: metadata only, content in cold storage.
    Ar,
}

impl StorageMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "edit" => Ok(Self::Edit),
            "rw" => Ok(Self::Rw),
            "ro" => Ok(Self::Ro),
            "ar" => Ok(Self::Ar),
            _ => Err(Error::invalid("storage mode", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Rw => "rw",
            Self::Ro => "ro",
            Self::Ar => "ar",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status of a storage element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementStatus {
    Online,
    Offline,
    Degraded,
    Maintenance,
}

impl ElementStatus {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "degraded" => Ok(Self::Degraded),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(Error::invalid("storage element status", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Degraded => "degraded",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a storage element display name.
pub fn validate_element_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 64 {
        return Err(Error::InvalidName(
            "storage element name must be 3-64 characters".to_string(),
        ));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');

    if !valid {
        return Err(Error::InvalidName(
            "storage element name must be lowercase alphanumeric with hyphens (no leading/trailing hyphens)"
                .to_string(),
        ));
    }

    Ok(())
}

/// Normalize and validate a storage node base URL.
///
/// Trailing slashes are stripped so that `http://node:8010/` and
/// `http://node:8010` refer to the same catalog entry.
pub fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "{url}: must be an HTTP or HTTPS URL"
        )));
    }
    let host = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(Error::InvalidUrl(format!("{url}: missing or invalid host")));
    }
    Ok(trimmed.to_string())
}
