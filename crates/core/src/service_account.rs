//! Service account vocabulary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Administrative status of a service account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            _ => Err(Error::invalid("service account status", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service account was first created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSource {
    /// Created through the control plane.
    Local,
    /// Imported from the identity provider's client registry.
    IdentityProvider,
}

impl AccountSource {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "identity_provider" => Ok(Self::IdentityProvider),
            _ => Err(Error::invalid("service account source", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::IdentityProvider => "identity_provider",
        }
    }
}

impl fmt::Display for AccountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_'
}

/// Validate a client id (the local-facing credential name).
pub fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.len() < 3 || client_id.len() > 64 {
        return Err(Error::InvalidClientId(
            "client id must be 3-64 characters".to_string(),
        ));
    }

    let valid = client_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c))
        && !client_id.starts_with(is_separator)
        && !client_id.ends_with(is_separator);

    if !valid {
        return Err(Error::InvalidClientId(format!(
            "{client_id}: must be lowercase alphanumeric with '-' or '_' (no leading/trailing separator)"
        )));
    }

    Ok(())
}

/// Validate, deduplicate and sort a scope list.
///
/// Two scope sets are equal for reconciliation purposes iff their normalized
/// forms are equal.
pub fn normalize_scopes<I, S>(scopes: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for scope in scopes {
        let scope = scope.as_ref().trim();
        let valid = !scope.is_empty()
            && scope.len() <= 128
            && scope.chars().all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ':' | '.' | '_' | '-')
            });
        if !valid {
            return Err(Error::InvalidScope(scope.to_string()));
        }
        out.insert(scope.to_string());
    }
    Ok(out.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_rules() {
        assert!(validate_client_id("ingest-worker").is_ok());
        assert!(validate_client_id("ingest_worker_2").is_ok());
        assert!(validate_client_id("ab").is_err());
        assert!(validate_client_id("_ingest").is_err());
        assert!(validate_client_id("Ingest").is_err());
    }

    #[test]
    fn scopes_are_sorted_and_deduplicated() {
        let scopes = normalize_scopes(["files:write", "files:read", "files:write"]).unwrap();
        assert_eq!(scopes, vec!["files:read", "files:write"]);
    }

    #[test]
    fn invalid_scope_rejected() {
        assert!(normalize_scopes(["files read"]).is_err());
        assert!(normalize_scopes([""]).is_err());
    }

    #[test]
    fn source_serializes_snake_case() {
        let json = serde_json::to_string(&AccountSource::IdentityProvider).unwrap();
        assert_eq!(json, "\"identity_provider\"");
    }
}
