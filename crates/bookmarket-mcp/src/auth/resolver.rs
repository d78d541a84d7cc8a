//! Role resolution strategies
//!
//! A verified token either carries its permissions, or names an organization
//! whose membership record holds the caller's role. [`ResolverStrategy`]
//! picks which of these sources is consulted; every strategy sits behind the
//! same [`RoleResolver`] interface and never fails the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::claims::Claims;
use super::config::{MembershipConfig, ResolverStrategy};
use super::membership::MembershipDirectory;
use super::principal::RoleGrant;
use super::rbac::PermissionMapper;
use crate::cache::{CacheKey, CacheProvider};

#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// Role and permissions for verified claims; failures degrade, never error
    async fn resolve(&self, claims: &Claims) -> RoleGrant;

    fn strategy(&self) -> ResolverStrategy;
}

fn record(source: &'static str) {
    #[cfg(feature = "metrics")]
    crate::observability::record_role_resolution(source);
    #[cfg(not(feature = "metrics"))]
    let _ = source;
}

/// Answers from the token alone
#[derive(Debug, Clone)]
pub struct ClaimsResolver {
    mapper: Arc<PermissionMapper>,
}

impl ClaimsResolver {
    pub const fn new(mapper: Arc<PermissionMapper>) -> Self {
        Self { mapper }
    }

    fn grant_for(&self, claims: &Claims) -> RoleGrant {
        let permissions = claims.permissions.clone().unwrap_or_else(|| {
            self.mapper
                .permissions_for_role(claims.role.as_deref())
        });
        RoleGrant::new(claims.role.clone(), permissions)
    }
}

#[async_trait]
impl RoleResolver for ClaimsResolver {
    async fn resolve(&self, claims: &Claims) -> RoleGrant {
        record("claims");
        self.grant_for(claims)
    }

    fn strategy(&self) -> ResolverStrategy {
        ResolverStrategy::Claims
    }
}

/// Looks the role up in the organization's membership directory
pub struct MembershipResolver {
    directory: Arc<dyn MembershipDirectory>,
    cache: Arc<dyn CacheProvider>,
    mapper: Arc<PermissionMapper>,
    ttl: Duration,
    fallback_role: Option<String>,
}

impl std::fmt::Debug for MembershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipResolver")
            .field("ttl", &self.ttl)
            .field("fallback_role", &self.fallback_role)
            .finish_non_exhaustive()
    }
}

impl MembershipResolver {
    pub fn new(
        directory: Arc<dyn MembershipDirectory>,
        cache: Arc<dyn CacheProvider>,
        mapper: Arc<PermissionMapper>,
        config: &MembershipConfig,
    ) -> Self {
        Self {
            directory,
            cache,
            mapper,
            ttl: config.cache_ttl,
            fallback_role: config.fallback_role.clone(),
        }
    }

    async fn cached(&self, key: &CacheKey) -> Option<RoleGrant> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(grant) => Some(grant),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable role grant");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Role cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, grant: &RoleGrant) {
        let bytes = match serde_json::to_vec(grant) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode role grant");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &bytes, Some(self.ttl)).await {
            tracing::warn!(key = %key, error = %e, "Role cache write failed");
        }
    }

    fn fallback(&self) -> RoleGrant {
        self.fallback_role.as_ref().map_or_else(RoleGrant::empty, |role| {
            RoleGrant::new(
                Some(role.clone()),
                self.mapper.permissions_for_role(Some(role)),
            )
        })
    }
}

#[async_trait]
impl RoleResolver for MembershipResolver {
    async fn resolve(&self, claims: &Claims) -> RoleGrant {
        let Some(organization_id) = claims.organization_id.as_deref() else {
            record("no_organization");
            return RoleGrant::empty();
        };

        let key = CacheKey::role_grant(&claims.subject_id, organization_id);
        if let Some(grant) = self.cached(&key).await {
            record("membership_cache");
            return grant;
        }

        match self
            .directory
            .role_slug(&claims.subject_id, organization_id)
            .await
        {
            Ok(slug) => {
                let permissions = self.mapper.permissions_for_role(slug.as_deref());
                let grant = RoleGrant::new(slug, permissions);
                tracing::debug!(
                    subject = %claims.subject_id,
                    organization = organization_id,
                    role = grant.role.as_deref().unwrap_or("none"),
                    "Resolved role from membership directory"
                );
                self.store(&key, &grant).await;
                record("membership");
                grant
            }
            Err(e) => {
                tracing::warn!(
                    subject = %claims.subject_id,
                    organization = organization_id,
                    error = %e,
                    fallback_role = self.fallback_role.as_deref().unwrap_or("none"),
                    "Membership lookup failed; applying fallback"
                );
                record("fallback");
                self.fallback()
            }
        }
    }

    fn strategy(&self) -> ResolverStrategy {
        ResolverStrategy::Membership
    }
}

/// Token permissions when present, membership lookup when an organization is named
#[derive(Debug)]
pub struct ChainedResolver {
    claims: ClaimsResolver,
    membership: MembershipResolver,
}

impl ChainedResolver {
    pub const fn new(claims: ClaimsResolver, membership: MembershipResolver) -> Self {
        Self { claims, membership }
    }
}

#[async_trait]
impl RoleResolver for ChainedResolver {
    async fn resolve(&self, claims: &Claims) -> RoleGrant {
        if claims.carries_permissions() || claims.organization_id.is_none() {
            self.claims.resolve(claims).await
        } else {
            self.membership.resolve(claims).await
        }
    }

    fn strategy(&self) -> ResolverStrategy {
        ResolverStrategy::ClaimsThenMembership
    }
}

/// Build the resolver for `strategy`
///
/// `directory` is `None` when no membership API key is configured. The chained
/// strategy then degrades to claims only; the membership strategy cannot.
pub fn build_resolver(
    strategy: ResolverStrategy,
    mapper: Arc<PermissionMapper>,
    directory: Option<Arc<dyn MembershipDirectory>>,
    cache: Arc<dyn CacheProvider>,
    config: &MembershipConfig,
) -> crate::Result<Arc<dyn RoleResolver>> {
    let claims = ClaimsResolver::new(Arc::clone(&mapper));
    match (strategy, directory) {
        (ResolverStrategy::Claims, _) => Ok(Arc::new(claims)),
        (ResolverStrategy::Membership, Some(directory)) => Ok(Arc::new(
            MembershipResolver::new(directory, cache, mapper, config),
        )),
        (ResolverStrategy::Membership, None) => Err(crate::Error::Config(
            "Role strategy 'membership' requires a membership API key".into(),
        )),
        (ResolverStrategy::ClaimsThenMembership, Some(directory)) => {
            Ok(Arc::new(ChainedResolver::new(
                claims,
                MembershipResolver::new(directory, cache, mapper, config),
            )))
        }
        (ResolverStrategy::ClaimsThenMembership, None) => {
            tracing::warn!(
                "No membership API key configured; roles are resolved from token claims only"
            );
            Ok(Arc::new(claims))
        }
    }
}
