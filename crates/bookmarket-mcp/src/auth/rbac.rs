//! Role-based access control: permissions and the role table

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission names understood by the tool catalog
pub mod permissions {
    pub const BOOKMARKS_READ: &str = "bookmarks:read";
    pub const BOOKMARKS_WRITE: &str = "bookmarks:write";
    pub const BOOKMARKS_DELETE: &str = "bookmarks:delete";
    pub const LISTS_READ: &str = "lists:read";
    pub const LISTS_WRITE: &str = "lists:write";
    pub const LISTS_DELETE: &str = "lists:delete";
    pub const TAGS_READ: &str = "tags:read";
    pub const TAGS_WRITE: &str = "tags:write";
}

/// Built-in role slugs
pub mod roles {
    pub const FREE_TIER: &str = "free-tier";
    pub const SUBSCRIBER: &str = "subscriber";
}

/// A `resource:action` capability string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission '{0}': expected resource:action")]
pub struct InvalidPermission(pub String);

impl Permission {
    /// Parse a `resource:action` pair; both halves are non-empty `[A-Za-z0-9_-]`
    pub fn parse(value: &str) -> Option<Self> {
        let (resource, action) = value.split_once(':')?;
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        };
        (valid(resource) && valid(action)).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> &str {
        self.0.split_once(':').map_or("", |(r, _)| r)
    }

    pub fn action(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, a)| a)
    }
}

impl FromStr for Permission {
    type Err = InvalidPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidPermission(s.to_string()))
    }
}

impl TryFrom<String> for Permission {
    type Error = InvalidPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

// `Ord` on the newtype matches `Ord` on `str`, so sets can be probed with `&str`.
impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a list of permission strings, dropping malformed entries
pub fn parse_permissions<I, S>(values: I) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|value| {
            let value = value.as_ref();
            let parsed = Permission::parse(value);
            if parsed.is_none() {
                tracing::debug!(permission = value, "Ignoring malformed permission");
            }
            parsed
        })
        .collect()
}

/// Static mapping from role slug to permission set
///
/// The built-in table has to track the identity provider's role catalog.
/// Roles missing from the table map to the empty set.
#[derive(Debug, Clone)]
pub struct PermissionMapper {
    roles: HashMap<String, BTreeSet<Permission>>,
}

impl Default for PermissionMapper {
    fn default() -> Self {
        use permissions::{
            BOOKMARKS_DELETE, BOOKMARKS_READ, BOOKMARKS_WRITE, LISTS_DELETE, LISTS_READ,
            LISTS_WRITE, TAGS_READ, TAGS_WRITE,
        };

        Self::empty()
            .with_role(roles::FREE_TIER, [BOOKMARKS_READ, LISTS_READ, TAGS_READ])
            .with_role(
                roles::SUBSCRIBER,
                [
                    BOOKMARKS_READ,
                    BOOKMARKS_WRITE,
                    BOOKMARKS_DELETE,
                    LISTS_READ,
                    LISTS_WRITE,
                    LISTS_DELETE,
                    TAGS_READ,
                    TAGS_WRITE,
                ],
            )
    }
}

impl PermissionMapper {
    /// A mapper with no roles; every lookup yields the empty set
    #[must_use]
    pub fn empty() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    /// Add or replace the permissions of `role`
    #[must_use]
    pub fn with_role<I, S>(mut self, role: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roles
            .insert(role.to_string(), parse_permissions(permissions));
        self
    }

    pub fn permissions_for_role(&self, role: Option<&str>) -> BTreeSet<Permission> {
        role.and_then(|r| self.roles.get(r))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}
