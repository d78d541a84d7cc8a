//! Bearer authentication middleware for HTTP transport
//!
//! This module requires the `http` feature for axum integration.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use super::jwt::TokenVerifier;
use super::principal::Principal;
use super::resolver::RoleResolver;

pub const NO_TOKEN_MESSAGE: &str = "No token provided";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

/// Authentication state for middleware
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
    pub resolver: Arc<dyn RoleResolver>,
    /// Advertised in the `WWW-Authenticate` challenge
    pub resource_metadata_url: String,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("verifier", &self.verifier)
            .field("strategy", &self.resolver.strategy())
            .field("resource_metadata_url", &self.resource_metadata_url)
            .finish()
    }
}

impl AuthState {
    #[must_use]
    pub fn new(
        verifier: Arc<TokenVerifier>,
        resolver: Arc<dyn RoleResolver>,
        resource_metadata_url: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            resolver,
            resource_metadata_url: resource_metadata_url.into(),
        }
    }
}

fn record(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    crate::observability::record_auth_attempt(outcome);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// 401 with a challenge pointing at the protected-resource metadata
pub fn unauthorized(message: &str, resource_metadata_url: &str) -> Response {
    let challenge = format!(
        r#"Bearer error="unauthorized", resource_metadata="{resource_metadata_url}""#
    );
    let mut response =
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Verify the bearer token and attach the caller's [`Principal`]
#[allow(clippy::future_not_send)]
pub async fn authenticate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        tracing::warn!(path = %request.uri().path(), "Missing bearer token");
        record("missing_token");
        return unauthorized(NO_TOKEN_MESSAGE, &state.resource_metadata_url);
    };

    let claims = match state.verifier.verify(token).await {
        Ok(claims) => claims,
        Err(e) => {
            // The token itself is never logged
            tracing::warn!(kind = e.kind(), error = %e, "Token verification failed");
            record("invalid_token");
            return unauthorized(INVALID_TOKEN_MESSAGE, &state.resource_metadata_url);
        }
    };

    let grant = state.resolver.resolve(&claims).await;
    let principal = Principal::from_claims(&claims, grant);
    tracing::debug!(
        subject = %principal.identity_id,
        organization = principal.organization_id.as_deref().unwrap_or("none"),
        role = principal.role.as_deref().unwrap_or("none"),
        permissions = principal.permissions.len(),
        "Authenticated request"
    );
    record("success");

    request.extensions_mut().insert(principal);
    next.run(request).await
}
