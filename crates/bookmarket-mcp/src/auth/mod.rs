//! Authentication and authorization
//!
//! A request is authorized in stages:
//!
//! - [`TokenVerifier`] checks the bearer token against keys from [`KeySetCache`]
//! - a [`RoleResolver`] turns the verified [`Claims`] into a role and permissions,
//!   either from the token itself or from the organization membership directory
//! - [`AccessGate`] decides per tool whether the caller's permissions suffice
//! - [`PolicyClient`] optionally asks a relationship store for a second opinion
//!
//! Failures are deliberately asymmetric. Token problems reject the request with
//! a 401. A membership outage resolves to no permissions (or the configured
//! fallback role). A policy service outage resolves to authorized unless
//! `fail_open` is turned off.

mod claims;
mod config;
mod context;
mod error;
mod gate;
mod jwks;
mod jwt;
mod membership;
#[cfg(feature = "http")]
mod metadata;
#[cfg(feature = "http")]
mod middleware;
mod policy;
mod principal;
mod rbac;
mod resolver;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use claims::{Claims, OneOrMany, PermissionsClaim, RawClaims};
pub use config::{
    AuthConfig, AuthMode, DEFAULT_MEMBERSHIP_URL, DEFAULT_POLICY_BASE_URL, JwtConfig,
    MembershipConfig, PolicyConfig, ResolverStrategy,
};
pub use context::{principal_from_extensions, request_principal};
pub use error::{KeyFetchError, Result, UpstreamError, VerificationError};
pub use gate::{AccessGate, ToolAccess, ToolAuthorizer, ToolDescriptor};
pub use jwks::{HttpKeySource, Jwk, JwkSet, KeySetCache, KeySource, SigningKey, SigningKeySet};
pub use jwt::TokenVerifier;
pub use membership::{HttpMembershipDirectory, MembershipDirectory};
#[cfg(feature = "http")]
pub use metadata::{
    AUTHORIZATION_SERVER_PATH, AuthorizationServerMetadata, DiscoveryDocuments,
    PROTECTED_RESOURCE_PATH, ProtectedResourceMetadata, discovery_router,
};
#[cfg(feature = "http")]
pub use middleware::{AuthState, authenticate, bearer_token, unauthorized};
pub use policy::{
    CheckTuple, HttpPolicyBackend, PolicyBackend, PolicyClient, PolicySubject, WarrantOp,
    WarrantWrite,
};
pub use principal::{Principal, RoleGrant};
pub use rbac::{
    InvalidPermission, Permission, PermissionMapper, parse_permissions, permissions, roles,
};
pub use resolver::{
    ChainedResolver, ClaimsResolver, MembershipResolver, RoleResolver, build_resolver,
};

use crate::cache::CacheProvider;
use crate::{Error, Result as CrateResult};

/// Verification half of the stack, present only in JWT mode
#[derive(Clone)]
pub struct Authenticator {
    pub verifier: Arc<TokenVerifier>,
    pub resolver: Arc<dyn RoleResolver>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("verifier", &self.verifier)
            .field("strategy", &self.resolver.strategy())
            .finish()
    }
}

/// Every authorization component wired from configuration
#[derive(Debug, Clone)]
pub struct AuthStack {
    pub config: Arc<AuthConfig>,
    pub authorizer: ToolAuthorizer,
    pub authenticator: Option<Authenticator>,
}

impl AuthStack {
    pub fn build(config: AuthConfig, cache: Arc<dyn CacheProvider>) -> CrateResult<Self> {
        let mapper = Arc::new(role_table(&config));

        let policy = PolicyClient::from_config(&config.policy, Arc::clone(&cache))
            .map_err(|e| Error::Config(format!("Invalid policy service settings: {e}")))?;
        if policy.is_configured() {
            tracing::info!(
                fail_open = config.policy.fail_open,
                ttl_secs = config.policy.cache_ttl.as_secs(),
                "Fine-grained policy checks enabled"
            );
        }
        let policy = Arc::new(policy);

        let jwt = match config.mode.jwt() {
            Some(jwt) => jwt.clone(),
            None => {
                tracing::info!("Authentication disabled; all tools are exposed");
                return Ok(Self {
                    authorizer: ToolAuthorizer::new(AccessGate::disabled(), policy),
                    authenticator: None,
                    config: Arc::new(config),
                });
            }
        };

        let jwks_uri = jwt
            .effective_jwks_uri()
            .map_err(|e| Error::Config(format!("Invalid JWKS URI: {e}")))?;
        let source = HttpKeySource::new(jwks_uri.clone(), jwt.jwks_timeout)
            .map_err(|e| Error::Config(format!("Failed to build JWKS client: {e}")))?;
        let keys = Arc::new(KeySetCache::new(Arc::new(source), jwt.jwks_cache_ttl));
        let issuer = jwt.issuer_str().to_string();
        let verifier = Arc::new(TokenVerifier::new(jwt, keys));

        let directory = membership_directory(&config.membership)?;
        let resolver = build_resolver(
            config.strategy,
            mapper,
            directory,
            cache,
            &config.membership,
        )?;

        tracing::info!(
            issuer = %issuer,
            jwks_uri = %jwks_uri,
            strategy = resolver.strategy().as_str(),
            "JWT authentication enabled"
        );

        Ok(Self {
            authorizer: ToolAuthorizer::new(AccessGate::enabled(), policy),
            authenticator: Some(Authenticator { verifier, resolver }),
            config: Arc::new(config),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.authenticator.is_some()
    }

    /// Middleware state for the HTTP transport
    #[cfg(feature = "http")]
    pub fn auth_state(&self, resource_url: &url::Url) -> Option<AuthState> {
        let authenticator = self.authenticator.as_ref()?;
        let metadata_url = config::join_path(resource_url, PROTECTED_RESOURCE_PATH)
            .map_or_else(|_| resource_url.to_string(), |u| u.to_string());
        Some(AuthState::new(
            Arc::clone(&authenticator.verifier),
            Arc::clone(&authenticator.resolver),
            metadata_url,
        ))
    }

    /// Discovery documents, when JWT authentication is configured
    #[cfg(feature = "http")]
    pub fn discovery(&self, resource_url: &url::Url) -> CrateResult<Option<DiscoveryDocuments>> {
        let Some(jwt) = self.config.mode.jwt() else {
            return Ok(None);
        };
        DiscoveryDocuments::new(
            resource_url.as_str(),
            jwt,
            self.config.default_organization.as_deref(),
        )
        .map(Some)
        .map_err(|e| Error::Config(format!("Invalid JWKS URI: {e}")))
    }
}

fn role_table(config: &AuthConfig) -> PermissionMapper {
    config
        .roles
        .iter()
        .fold(PermissionMapper::default(), |mapper, (role, perms)| {
            tracing::debug!(role = role.as_str(), permissions = perms.len(), "Role table override");
            mapper.with_role(role, perms)
        })
}

fn membership_directory(
    config: &MembershipConfig,
) -> CrateResult<Option<Arc<dyn MembershipDirectory>>> {
    let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    let url = config
        .effective_url()
        .map_err(|e| Error::Config(format!("Invalid membership URL: {e}")))?;
    let directory = HttpMembershipDirectory::new(url, api_key.to_string(), config.timeout)
        .map_err(|e| Error::Config(format!("Failed to build membership client: {e}")))?;
    Ok(Some(Arc::new(directory)))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::cache::InMemoryCache;

    fn cache() -> Arc<dyn CacheProvider> {
        Arc::new(InMemoryCache::new())
    }

    fn jwt_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwt(Box::new(JwtConfig::new(
                Url::parse("https://auth.bookmarket.test").unwrap(),
            ))),
            ..AuthConfig::new()
        }
    }

    #[test]
    fn test_disabled_stack() {
        let stack = AuthStack::build(AuthConfig::new(), cache()).unwrap();
        assert!(!stack.is_enabled());
        assert!(!stack.authorizer.gate().is_enabled());
    }

    #[test]
    fn test_jwt_stack_without_membership_key_uses_claims() {
        let stack = AuthStack::build(jwt_config(), cache()).unwrap();
        let authenticator = stack.authenticator.unwrap();
        assert_eq!(authenticator.resolver.strategy(), ResolverStrategy::Claims);
        assert!(stack.authorizer.gate().is_enabled());
        assert!(!stack.authorizer.policy().is_configured());
    }

    #[test]
    fn test_jwt_stack_with_membership_key_chains() {
        let mut config = jwt_config();
        config.membership.api_key = Some("sk_test".into());
        let stack = AuthStack::build(config, cache()).unwrap();
        assert_eq!(
            stack.authenticator.unwrap().resolver.strategy(),
            ResolverStrategy::ClaimsThenMembership
        );
    }

    #[test]
    fn test_membership_strategy_requires_key() {
        let mut config = jwt_config();
        config.strategy = ResolverStrategy::Membership;
        assert!(AuthStack::build(config, cache()).unwrap_err().is_config());
    }

    #[test]
    fn test_role_overrides_applied() {
        let mut config = AuthConfig::new();
        config.roles = vec![("admin".into(), vec!["lists:delete".into()])];
        let mapper = role_table(&config);
        assert!(mapper.has_role("admin"));
        assert!(mapper.has_role(roles::SUBSCRIBER));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_wiring() {
        let stack = AuthStack::build(jwt_config(), cache()).unwrap();
        let resource = Url::parse("http://127.0.0.1:8080").unwrap();

        let state = stack.auth_state(&resource).unwrap();
        assert_eq!(
            state.resource_metadata_url,
            "http://127.0.0.1:8080/.well-known/oauth-protected-resource"
        );
        let docs = stack.discovery(&resource).unwrap().unwrap();
        assert_eq!(docs.protected_resource.resource, "http://127.0.0.1:8080");

        let disabled = AuthStack::build(AuthConfig::new(), cache()).unwrap();
        assert!(disabled.auth_state(&resource).is_none());
        assert!(disabled.discovery(&resource).unwrap().is_none());
    }
}
