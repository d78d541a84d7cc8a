//! Authentication configuration types

use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const DEFAULT_MEMBERSHIP_URL: &str =
    "https://api.workos.com/user_management/organization_memberships";
pub const DEFAULT_POLICY_BASE_URL: &str = "https://api.workos.com/fga/v1";

/// Authentication mode
#[derive(Debug, Clone, Default)]
pub enum AuthMode {
    /// No authentication; every tool is exposed (stdio, local development)
    #[default]
    None,
    /// Bearer JWTs verified against the issuer's key set
    Jwt(Box<JwtConfig>),
}

impl AuthMode {
    pub fn jwt(&self) -> Option<&JwtConfig> {
        match self {
            Self::Jwt(config) => Some(config),
            Self::None => None,
        }
    }
}

/// JWT verification settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Authorization server base URL, e.g. `https://example.authkit.app`
    pub issuer: Url,
    /// Check the `iss` claim against `issuer`
    pub validate_issuer: bool,
    /// Expected audience claims (must contain at least one match)
    pub audience: Vec<String>,
    /// Defaults to `{issuer}/oauth2/jwks`
    pub jwks_uri: Option<Url>,
    /// Clock skew tolerance for exp/nbf validation
    pub clock_skew: Duration,
    pub jwks_cache_ttl: Duration,
    pub jwks_timeout: Duration,
}

impl JwtConfig {
    #[must_use]
    pub const fn new(issuer: Url) -> Self {
        Self {
            issuer,
            validate_issuer: true,
            audience: Vec::new(),
            jwks_uri: None,
            clock_skew: Duration::from_secs(60),
            jwks_cache_ttl: Duration::from_secs(3600),
            jwks_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_jwks_uri(mut self, uri: Url) -> Self {
        self.jwks_uri = Some(uri);
        self
    }

    /// Issuer without a trailing slash, as it appears in `iss`
    pub fn issuer_str(&self) -> &str {
        self.issuer.as_str().trim_end_matches('/')
    }

    pub fn effective_jwks_uri(&self) -> Result<Url, url::ParseError> {
        self.jwks_uri
            .clone()
            .map_or_else(|| join_path(&self.issuer, "oauth2/jwks"), Ok)
    }
}

/// Append `path` to `base` without dropping `base`'s last segment
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

/// Which role source the resolver consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverStrategy {
    /// Role and permissions come from the token only
    Claims,
    /// Role always comes from the membership directory
    Membership,
    /// Token permissions when present, membership lookup otherwise
    #[default]
    ClaimsThenMembership,
}

impl ResolverStrategy {
    pub const fn uses_membership(self) -> bool {
        matches!(self, Self::Membership | Self::ClaimsThenMembership)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::Membership => "membership",
            Self::ClaimsThenMembership => "claims_then_membership",
        }
    }
}

impl FromStr for ResolverStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "claims" | "token" => Ok(Self::Claims),
            "membership" | "api" => Ok(Self::Membership),
            "claims_then_membership" | "auto" => Ok(Self::ClaimsThenMembership),
            other => Err(crate::Error::Config(format!(
                "Unknown role strategy '{other}' (expected claims, membership or claims_then_membership)"
            ))),
        }
    }
}

/// Membership directory settings
#[derive(Clone)]
pub struct MembershipConfig {
    /// Defaults to [`DEFAULT_MEMBERSHIP_URL`]
    pub url: Option<Url>,
    pub api_key: Option<String>,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    /// Role applied when the directory is unreachable. `None` denies.
    pub fallback_role: Option<String>,
}

impl std::fmt::Debug for MembershipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipConfig")
            .field("url", &self.url)
            .field("has_api_key", &self.api_key.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("timeout", &self.timeout)
            .field("fallback_role", &self.fallback_role)
            .finish()
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            url: None,
            api_key: None,
            cache_ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(5),
            fallback_role: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn effective_url(&self) -> Result<Url, url::ParseError> {
        self.url
            .clone()
            .map_or_else(|| Url::parse(DEFAULT_MEMBERSHIP_URL), Ok)
    }
}

/// Fine-grained policy service settings
#[derive(Clone)]
pub struct PolicyConfig {
    /// Defaults to [`DEFAULT_POLICY_BASE_URL`]
    pub base_url: Option<Url>,
    pub api_key: Option<String>,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    /// Treat check failures as authorized
    pub fail_open: bool,
}

impl std::fmt::Debug for PolicyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyConfig")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("timeout", &self.timeout)
            .field("fail_open", &self.fail_open)
            .finish()
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            cache_ttl: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            fail_open: true,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn effective_base_url(&self) -> Result<Url, url::ParseError> {
        self.base_url
            .clone()
            .map_or_else(|| Url::parse(DEFAULT_POLICY_BASE_URL), Ok)
    }
}

/// Complete authentication and authorization configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub strategy: ResolverStrategy,
    pub membership: MembershipConfig,
    pub policy: PolicyConfig,
    /// Public URL of this server; resolved from the bind address when unset
    pub resource_url: Option<Url>,
    /// Organization preselected on the authorization endpoint
    pub default_organization: Option<String>,
    /// Role table overrides: role slug and its permission strings
    pub roles: Vec<(String, Vec<String>)>,
}

impl AuthConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: AuthMode::None,
            strategy: ResolverStrategy::ClaimsThenMembership,
            membership: MembershipConfig::new(),
            policy: PolicyConfig::new(),
            resource_url: None,
            default_organization: None,
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.mode, AuthMode::None)
    }

    /// `{resource}/.well-known/oauth-protected-resource`
    pub fn resource_metadata_url(&self) -> Option<Url> {
        self.resource_url
            .as_ref()
            .and_then(|r| join_path(r, ".well-known/oauth-protected-resource").ok())
    }
}
