//! Request-scoped caller identity

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::claims::Claims;
use super::rbac::Permission;

/// Outcome of role resolution, also the cached value for membership lookups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Option<String>,
    pub permissions: BTreeSet<Permission>,
}

impl RoleGrant {
    /// No role, no permissions
    pub fn empty() -> Self {
        Self::default()
    }

    pub const fn new(role: Option<String>, permissions: BTreeSet<Permission>) -> Self {
        Self { role, permissions }
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.permissions.is_empty()
    }
}

/// An authenticated caller, attached to the request by the auth middleware
///
/// Lives only for the duration of one request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity_id: String,
    pub organization_id: Option<String>,
    pub role: Option<String>,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            organization_id: None,
            role: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn from_claims(claims: &Claims, grant: RoleGrant) -> Self {
        Self {
            identity_id: claims.subject_id.clone(),
            organization_id: claims.organization_id.clone(),
            role: grant.role,
            permissions: grant.permissions,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Add permissions; malformed strings are ignored
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permissions
            .extend(super::rbac::parse_permissions(permissions));
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
