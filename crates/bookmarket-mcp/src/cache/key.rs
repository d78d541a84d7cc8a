//! Cache key types and factory methods

use std::fmt;

/// Cache key namespace, one per decision cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Role and permissions resolved from the membership directory
    RoleGrant,
    /// Fine-grained policy decisions per (tool, subject)
    PolicyDecision,
}

impl CacheNamespace {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RoleGrant => "role",
            Self::PolicyDecision => "policy",
        }
    }
}

/// Structured cache key with namespace isolation
///
/// Both parts are escaped before joining, so `("user:1", "org")` and
/// `("user", "1:org")` never share a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    identifier: String,
    variant: String,
}

impl CacheKey {
    /// Key for a role grant of `subject` inside `organization`
    #[must_use]
    pub fn role_grant(subject_id: &str, organization_id: &str) -> Self {
        Self {
            namespace: CacheNamespace::RoleGrant,
            identifier: subject_id.to_string(),
            variant: organization_id.to_string(),
        }
    }

    /// Key for the policy decision "may `subject` execute `tool`"
    #[must_use]
    pub fn policy_decision(tool: &str, subject_id: &str) -> Self {
        Self {
            namespace: CacheNamespace::PolicyDecision,
            identifier: tool.to_string(),
            variant: subject_id.to_string(),
        }
    }

    #[must_use]
    pub const fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    /// Convert to string key for storage
    #[must_use]
    pub fn to_key_string(&self) -> String {
        format!(
            "{}:{}:{}",
            self.namespace.as_str(),
            escape(&self.identifier),
            escape(&self.variant)
        )
    }
}

/// Percent-escape the separator and the escape character itself
fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}
