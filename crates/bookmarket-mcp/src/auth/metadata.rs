//! OAuth discovery documents
//!
//! MCP clients follow the `resource_metadata` link from a 401 challenge to the
//! protected-resource document, then to the authorization server metadata.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use serde::Serialize;

use super::config::JwtConfig;

pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub response_modes_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
}

/// Both discovery documents, rendered once at startup
#[derive(Debug, Clone)]
pub struct DiscoveryDocuments {
    pub protected_resource: ProtectedResourceMetadata,
    pub authorization_server: AuthorizationServerMetadata,
}

impl DiscoveryDocuments {
    pub fn new(
        resource: &str,
        jwt: &JwtConfig,
        default_organization: Option<&str>,
    ) -> Result<Self, url::ParseError> {
        let issuer = jwt.issuer_str().to_string();

        let mut authorization_endpoint = url::Url::parse(&format!("{issuer}/oauth2/authorize"))?;
        if let Some(org) = default_organization.filter(|o| !o.is_empty()) {
            authorization_endpoint
                .query_pairs_mut()
                .append_pair("organization_id", org);
        }

        Ok(Self {
            protected_resource: ProtectedResourceMetadata {
                resource: resource.trim_end_matches('/').to_string(),
                authorization_servers: vec![issuer.clone()],
                bearer_methods_supported: vec!["header"],
            },
            authorization_server: AuthorizationServerMetadata {
                authorization_endpoint: authorization_endpoint.into(),
                token_endpoint: format!("{issuer}/oauth2/token"),
                registration_endpoint: format!("{issuer}/oauth2/register"),
                userinfo_endpoint: format!("{issuer}/oauth2/userinfo"),
                jwks_uri: jwt.effective_jwks_uri()?.to_string(),
                issuer,
                response_types_supported: vec!["code"],
                response_modes_supported: vec!["query"],
                grant_types_supported: vec!["authorization_code", "refresh_token"],
                code_challenge_methods_supported: vec!["S256"],
                token_endpoint_auth_methods_supported: vec![
                    "none",
                    "client_secret_post",
                    "client_secret_basic",
                ],
                scopes_supported: vec!["email", "offline_access", "openid", "profile"],
            },
        })
    }
}

async fn protected_resource(
    State(docs): State<Arc<DiscoveryDocuments>>,
) -> Json<ProtectedResourceMetadata> {
    Json(docs.protected_resource.clone())
}

async fn authorization_server(
    State(docs): State<Arc<DiscoveryDocuments>>,
) -> Json<AuthorizationServerMetadata> {
    Json(docs.authorization_server.clone())
}

/// Routes serving both documents, with and without a trailing resource path
pub fn discovery_router(docs: DiscoveryDocuments) -> Router {
    Router::new()
        .route(PROTECTED_RESOURCE_PATH, get(protected_resource))
        .route(
            &format!("{PROTECTED_RESOURCE_PATH}/{{*path}}"),
            get(protected_resource),
        )
        .route(AUTHORIZATION_SERVER_PATH, get(authorization_server))
        .route(
            &format!("{AUTHORIZATION_SERVER_PATH}/{{*path}}"),
            get(authorization_server),
        )
        .with_state(Arc::new(docs))
}
