//! Configuration builder

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::auth::{
    AuthConfig, AuthMode, JwtConfig, MembershipConfig, PolicyConfig, ResolverStrategy,
};
use crate::cache::{CacheBackend, CacheConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    /// Public URL of this server, as advertised in discovery documents
    pub resource_url: Url,
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Transport mode configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub http_host: IpAddr,
    pub http_port: u16,
    /// Allowed CORS origins, comma-separated; `*` allows any
    pub cors_origin: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stdio,
            http_host: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            http_port: 8080,
            cors_origin: None,
        }
    }
}

impl TransportConfig {
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http_host, self.http_port)
    }

    fn local_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}", self.bind_addr()))
    }
}

/// Transport mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "http" | "streamable-http" => Self::Http,
            _ => Self::Stdio,
        })
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Requested authentication mode, before the issuer is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    None,
    Jwt,
}

impl FromStr for AuthKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "jwt" | "oauth" => Ok(Self::Jwt),
            other => Err(Error::Config(format!(
                "Unknown auth mode '{other}'; expected 'none' or 'jwt'"
            ))),
        }
    }
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    transport: TransportConfig,
    telemetry: TelemetryConfig,
    cache: CacheConfig,
    auth_kind: Option<AuthKind>,
    issuer: Option<Url>,
    jwks_uri: Option<Url>,
    audience: Vec<String>,
    clock_skew: Option<Duration>,
    jwks_cache_ttl: Option<Duration>,
    strategy: ResolverStrategy,
    membership: MembershipConfig,
    policy: PolicyConfig,
    resource_url: Option<Url>,
    default_organization: Option<String>,
    roles: Vec<(String, Vec<String>)>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: TransportConfig::default(),
            telemetry: TelemetryConfig::default(),
            cache: CacheConfig::new(),
            auth_kind: None,
            issuer: None,
            jwks_uri: None,
            audience: Vec::new(),
            clock_skew: None,
            jwks_cache_ttl: None,
            strategy: ResolverStrategy::default(),
            membership: MembershipConfig::new(),
            policy: PolicyConfig::new(),
            resource_url: None,
            default_organization: None,
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub const fn transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport.mode = mode;
        self
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.transport.http_host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.transport.http_port = port;
        self
    }

    #[must_use]
    pub fn cors_origin(mut self, origin: Option<String>) -> Self {
        self.transport.cors_origin = origin;
        self
    }

    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.telemetry.otlp_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    // Authentication

    #[must_use]
    pub const fn auth_mode(mut self, kind: AuthKind) -> Self {
        self.auth_kind = Some(kind);
        self
    }

    /// Setting an issuer alone enables JWT mode unless a mode was chosen explicitly
    #[must_use]
    pub fn issuer(mut self, issuer: Url) -> Self {
        self.issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn jwks_uri(mut self, uri: Url) -> Self {
        self.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = Some(skew);
        self
    }

    #[must_use]
    pub const fn jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn role_strategy(mut self, strategy: ResolverStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn resource_url(mut self, url: Url) -> Self {
        self.resource_url = Some(url);
        self
    }

    #[must_use]
    pub fn default_organization(mut self, organization: Option<String>) -> Self {
        self.default_organization = organization.filter(|o| !o.is_empty());
        self
    }

    /// Replace the permissions of one role in the role table
    #[must_use]
    pub fn role(mut self, name: impl Into<String>, permissions: Vec<String>) -> Self {
        let name = name.into();
        self.roles.retain(|(existing, _)| *existing != name);
        self.roles.push((name, permissions));
        self
    }

    // Membership directory

    #[must_use]
    pub fn membership_url(mut self, url: Url) -> Self {
        self.membership.url = Some(url);
        self
    }

    #[must_use]
    pub fn membership_api_key(mut self, key: String) -> Self {
        self.membership.api_key = Some(key);
        self
    }

    #[must_use]
    pub const fn membership_cache_ttl(mut self, ttl: Duration) -> Self {
        self.membership.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn membership_timeout(mut self, timeout: Duration) -> Self {
        self.membership.timeout = timeout;
        self
    }

    #[must_use]
    pub fn fallback_role(mut self, role: Option<String>) -> Self {
        self.membership.fallback_role = role.filter(|r| !r.is_empty());
        self
    }

    // Policy service

    #[must_use]
    pub fn policy_url(mut self, url: Url) -> Self {
        self.policy.base_url = Some(url);
        self
    }

    #[must_use]
    pub fn policy_api_key(mut self, key: String) -> Self {
        self.policy.api_key = Some(key);
        self
    }

    #[must_use]
    pub const fn policy_cache_ttl(mut self, ttl: Duration) -> Self {
        self.policy.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn policy_timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn policy_fail_open(mut self, fail_open: bool) -> Self {
        self.policy.fail_open = fail_open;
        self
    }

    // Cache

    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache.backend = backend;
        self
    }

    #[must_use]
    pub const fn cache_max_entries(mut self, max: Option<usize>) -> Self {
        self.cache.max_entries = max;
        self
    }

    #[must_use]
    pub const fn cache_default_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl = ttl;
        self
    }

    fn auth_mode_resolved(&self) -> crate::Result<AuthMode> {
        let kind = self.auth_kind.unwrap_or(if self.issuer.is_some() {
            AuthKind::Jwt
        } else {
            AuthKind::None
        });

        if kind == AuthKind::None {
            return Ok(AuthMode::None);
        }

        let issuer = self
            .issuer
            .clone()
            .ok_or_else(|| Error::Config("auth mode 'jwt' requires an issuer".into()))?;

        let mut jwt = JwtConfig::new(issuer).with_audience(self.audience.clone());
        if let Some(uri) = self.jwks_uri.clone() {
            jwt = jwt.with_jwks_uri(uri);
        }
        if let Some(skew) = self.clock_skew {
            jwt.clock_skew = skew;
        }
        if let Some(ttl) = self.jwks_cache_ttl {
            jwt.jwks_cache_ttl = ttl;
        }
        Ok(AuthMode::Jwt(Box::new(jwt)))
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let mode = self.auth_mode_resolved()?;

        if mode.jwt().is_some()
            && self.strategy == ResolverStrategy::Membership
            && !self.membership.is_configured()
        {
            return Err(Error::Config(
                "role strategy 'membership' requires a membership API key".into(),
            ));
        }

        let resource_url = match self.resource_url {
            Some(url) => url,
            None => self
                .transport
                .local_url()
                .map_err(|e| Error::Config(format!("Invalid HTTP bind address: {e}")))?,
        };

        // Apply defaults for telemetry
        let service_name = if self.telemetry.service_name.is_empty() {
            "bookmarket-mcp".to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            transport: self.transport,
            telemetry: TelemetryConfig {
                otlp_endpoint: self.telemetry.otlp_endpoint,
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
            auth: AuthConfig {
                mode,
                strategy: self.strategy,
                membership: self.membership,
                policy: self.policy,
                resource_url: Some(resource_url.clone()),
                default_organization: self.default_organization,
                roles: self.roles,
            },
            cache: self.cache,
            resource_url,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl ConfigBuilder {
    pub(super) fn auth_kind(&self) -> Option<AuthKind> {
        self.auth_kind
    }

    pub(super) const fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub(super) const fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }

    pub(super) const fn membership(&self) -> &MembershipConfig {
        &self.membership
    }

    pub(super) const fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub(super) const fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub(super) fn roles(&self) -> &[(String, Vec<String>)] {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> Url {
        Url::parse("https://auth.bookmarket.test").unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.transport.mode, TransportMode::Stdio);
        assert!(!config.auth.is_enabled());
        assert_eq!(config.telemetry.service_name, "bookmarket-mcp");
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.cache.enabled);
        assert!(config.auth.policy.fail_open);
    }

    #[test]
    fn test_resource_url_defaults_to_bind_address() {
        let config = ConfigBuilder::new().http_port(9090).build().unwrap();
        assert_eq!(config.resource_url.as_str(), "http://127.0.0.1:9090/");

        let config = ConfigBuilder::new()
            .http_host("::1".parse().unwrap())
            .build()
            .unwrap();
        assert_eq!(config.resource_url.as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn test_explicit_resource_url() {
        let url = Url::parse("https://mcp.bookmarket.test").unwrap();
        let config = ConfigBuilder::new().resource_url(url.clone()).build().unwrap();
        assert_eq!(config.resource_url, url);
    }

    #[test]
    fn test_issuer_enables_jwt() {
        let config = ConfigBuilder::new().issuer(issuer()).build().unwrap();
        let jwt = config.auth.mode.jwt().unwrap();
        assert_eq!(
            jwt.effective_jwks_uri().unwrap().as_str(),
            "https://auth.bookmarket.test/oauth2/jwks"
        );
    }

    #[test]
    fn test_explicit_none_overrides_issuer() {
        let config = ConfigBuilder::new()
            .issuer(issuer())
            .auth_mode(AuthKind::None)
            .build()
            .unwrap();
        assert!(!config.auth.is_enabled());
    }

    #[test]
    fn test_jwt_requires_issuer() {
        let err = ConfigBuilder::new()
            .auth_mode(AuthKind::Jwt)
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_jwt_settings_applied() {
        let config = ConfigBuilder::new()
            .issuer(issuer())
            .audience(vec!["client_01".into()])
            .clock_skew(Duration::from_secs(5))
            .jwks_cache_ttl(Duration::from_secs(120))
            .build()
            .unwrap();
        let jwt = config.auth.mode.jwt().unwrap();
        assert_eq!(jwt.audience, vec!["client_01".to_string()]);
        assert_eq!(jwt.clock_skew, Duration::from_secs(5));
        assert_eq!(jwt.jwks_cache_ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_membership_strategy_requires_key() {
        let err = ConfigBuilder::new()
            .issuer(issuer())
            .role_strategy(ResolverStrategy::Membership)
            .build()
            .unwrap_err();
        assert!(err.is_config());

        let config = ConfigBuilder::new()
            .issuer(issuer())
            .role_strategy(ResolverStrategy::Membership)
            .membership_api_key("sk_test".into())
            .build()
            .unwrap();
        assert_eq!(config.auth.strategy, ResolverStrategy::Membership);
    }

    #[test]
    fn test_chained_strategy_without_key_is_accepted() {
        let config = ConfigBuilder::new().issuer(issuer()).build().unwrap();
        assert_eq!(config.auth.strategy, ResolverStrategy::ClaimsThenMembership);
    }

    #[test]
    fn test_role_override_replaces_previous() {
        let config = ConfigBuilder::new()
            .role("editor", vec!["lists:read".into()])
            .role("editor", vec!["lists:write".into()])
            .build()
            .unwrap();
        assert_eq!(
            config.auth.roles,
            vec![("editor".to_string(), vec!["lists:write".to_string()])]
        );
    }

    #[test]
    fn test_empty_optional_strings_ignored() {
        let config = ConfigBuilder::new()
            .default_organization(Some(String::new()))
            .fallback_role(Some(String::new()))
            .build()
            .unwrap();
        assert!(config.auth.default_organization.is_none());
        assert!(config.auth.membership.fallback_role.is_none());
    }

    #[test]
    fn test_transport_mode_parsing() {
        assert_eq!("stdio".parse::<TransportMode>().unwrap(), TransportMode::Stdio);
        assert_eq!("HTTP".parse::<TransportMode>().unwrap(), TransportMode::Http);
        assert_eq!(
            "streamable-http".parse::<TransportMode>().unwrap(),
            TransportMode::Http
        );
        assert_eq!("unknown".parse::<TransportMode>().unwrap(), TransportMode::Stdio);
    }

    #[test]
    fn test_auth_kind_parsing() {
        assert_eq!("jwt".parse::<AuthKind>().unwrap(), AuthKind::Jwt);
        assert_eq!("None".parse::<AuthKind>().unwrap(), AuthKind::None);
        assert!("saml".parse::<AuthKind>().unwrap_err().is_config());
    }
}
