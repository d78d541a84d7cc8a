//! Organization membership directory

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::error::UpstreamError;

/// Looks up a subject's role slug within an organization
///
/// `Ok(None)` means the subject has no membership; transport and decoding
/// problems are reported as errors so the resolver can apply its fallback.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn role_slug(
        &self,
        subject_id: &str,
        organization_id: &str,
    ) -> Result<Option<String>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct RoleRef {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct MembershipRecord {
    #[serde(default)]
    role: Option<RoleRef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MembershipList {
    Paged { data: Vec<MembershipRecord> },
    Bare(Vec<MembershipRecord>),
}

impl MembershipList {
    fn into_records(self) -> Vec<MembershipRecord> {
        match self {
            Self::Paged { data } | Self::Bare(data) => data,
        }
    }
}

/// Parse a membership listing; the first record wins
fn first_role_slug(body: &[u8]) -> Result<Option<String>, UpstreamError> {
    let list: MembershipList =
        serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    Ok(list
        .into_records()
        .into_iter()
        .next()
        .and_then(|r| r.role)
        .map(|r| r.slug)
        .filter(|s| !s.is_empty()))
}

/// Membership directory backed by the identity provider's REST API
pub struct HttpMembershipDirectory {
    client: reqwest::Client,
    url: Url,
    api_key: String,
}

impl std::fmt::Debug for HttpMembershipDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMembershipDirectory")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpMembershipDirectory {
    pub fn new(url: Url, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl MembershipDirectory for HttpMembershipDirectory {
    async fn role_slug(
        &self,
        subject_id: &str,
        organization_id: &str,
    ) -> Result<Option<String>, UpstreamError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("user_id", subject_id), ("organization_id", organization_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        first_role_slug(&body)
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_paged_body() {
        let body = br#"{"data":[{"role":{"slug":"subscriber"}},{"role":{"slug":"free-tier"}}]}"#;
        assert_eq!(first_role_slug(body).unwrap().as_deref(), Some("subscriber"));
    }

    #[test]
    fn test_bare_array_body() {
        let body = br#"[{"id":"om_1","role":{"slug":"free-tier"}}]"#;
        assert_eq!(first_role_slug(body).unwrap().as_deref(), Some("free-tier"));
    }

    #[test]
    fn test_empty_membership_is_none() {
        assert!(first_role_slug(br#"{"data":[]}"#).unwrap().is_none());
        assert!(first_role_slug(b"[]").unwrap().is_none());
        assert!(first_role_slug(br#"[{"id":"om_1"}]"#).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_body_is_error() {
        assert!(matches!(
            first_role_slug(b"<html>").unwrap_err(),
            UpstreamError::Decode(_)
        ));
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{addr}/memberships")).unwrap()
    }

    #[tokio::test]
    async fn test_http_directory_sends_query_and_key() {
        let router = Router::new().route(
            "/memberships",
            get(
                |headers: HeaderMap,
                 Query(q): Query<std::collections::HashMap<String, String>>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer sk_test");
                    if !authorized {
                        return (StatusCode::UNAUTHORIZED, axum::Json(json!({})));
                    }
                    let role = if q.get("user_id").map(String::as_str) == Some("user_1")
                        && q.get("organization_id").map(String::as_str) == Some("org_1")
                    {
                        json!([{"role": {"slug": "subscriber"}}])
                    } else {
                        json!([])
                    };
                    (StatusCode::OK, axum::Json(json!({ "data": role })))
                },
            ),
        );
        let url = serve(router).await;

        let directory =
            HttpMembershipDirectory::new(url.clone(), "sk_test".into(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            directory.role_slug("user_1", "org_1").await.unwrap().as_deref(),
            Some("subscriber")
        );
        assert!(directory.role_slug("user_2", "org_1").await.unwrap().is_none());

        let wrong_key =
            HttpMembershipDirectory::new(url, "sk_wrong".into(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            wrong_key.role_slug("user_1", "org_1").await.unwrap_err(),
            UpstreamError::Status(401)
        ));
    }

    #[tokio::test]
    async fn test_http_directory_server_error() {
        let router = Router::new().route(
            "/memberships",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(Value::Null)) }),
        );
        let url = serve(router).await;
        let directory =
            HttpMembershipDirectory::new(url, "k".into(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            directory.role_slug("u", "o").await.unwrap_err(),
            UpstreamError::Status(500)
        ));
    }
}
