//! Access roles and the role resolver.
//!
//! Roles form a total order (`readonly < admin`). The resolver functions are
//! pure and perform no I/O, so request handlers call them freely.
//!
//! Absence of any role is modelled as `None`. Callers decide what that means
//! for authorization; the HTTP layer treats it as "no access".

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access role. Declaration order defines privilege order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Readonly,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "readonly" => Ok(Self::Readonly),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::invalid("role", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective role of a user whose identity provider asserts `idp_role`.
///
/// An override can only raise privilege: the result is the maximum of both.
pub fn effective_role(idp_role: Role, override_role: Option<Role>) -> Role {
    match override_role {
        Some(o) => idp_role.max(o),
        None => idp_role,
    }
}

/// Like [`effective_role`], for callers whose groups may map to no role.
pub fn resolve_access(idp_role: Option<Role>, override_role: Option<Role>) -> Option<Role> {
    idp_role.max(override_role)
}

/// Highest role in `roles`, or `None` when empty.
pub fn highest_role<I>(roles: I) -> Option<Role>
where
    I: IntoIterator<Item = Role>,
{
    roles.into_iter().max()
}

fn group_name(group: &str) -> &str {
    // Keycloak reports full group paths ("/artstore-admins").
    group.trim().trim_start_matches('/')
}

/// Highest role implied by membership in any configured group.
///
/// Returns `None` (not an error) when no group matches.
pub fn map_groups_to_role<G, A, R>(groups: &[G], admin_groups: &[A], readonly_groups: &[R]) -> Option<Role>
where
    G: AsRef<str>,
    A: AsRef<str>,
    R: AsRef<str>,
{
    let member_of = |configured: &str| {
        groups
            .iter()
            .any(|g| group_name(g.as_ref()) == group_name(configured))
    };

    let implied = admin_groups
        .iter()
        .filter(|g| member_of(g.as_ref()))
        .map(|_| Role::Admin)
        .chain(
            readonly_groups
                .iter()
                .filter(|g| member_of(g.as_ref()))
                .map(|_| Role::Readonly),
        );

    highest_role(implied)
}
