//! Fine-grained policy client
//!
//! A relationship store answers "may this user execute this tool". It sits on
//! top of the permission gate as an optional second layer, so an unreachable
//! service resolves to the configured fallback (authorized unless
//! `fail_open = false`) instead of locking users out.
//!
//! Decisions are cached per tool and subject. Grants and revocations bump a
//! per-key epoch while deleting the cached decision, and a pending check only
//! stores its answer if the epoch it read before the remote call is still
//! current. A stale decision therefore never overwrites an invalidation.
//! Epochs are only tracked for keys with a check in flight.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use super::config::{PolicyConfig, join_path};
use super::error::UpstreamError;
use crate::cache::{CacheKey, CacheProvider};

pub const TOOL_RESOURCE_TYPE: &str = "mcp_tool";
pub const EXECUTE_RELATION: &str = "can_execute";
pub const USER_SUBJECT_TYPE: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySubject {
    pub resource_type: &'static str,
    pub resource_id: String,
}

/// One relationship tuple: subject, relation, resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckTuple {
    pub resource_type: &'static str,
    pub resource_id: String,
    pub relation: &'static str,
    pub subject: PolicySubject,
}

impl CheckTuple {
    pub fn can_execute(tool: &str, subject_id: &str) -> Self {
        Self {
            resource_type: TOOL_RESOURCE_TYPE,
            resource_id: tool.to_string(),
            relation: EXECUTE_RELATION,
            subject: PolicySubject {
                resource_type: USER_SUBJECT_TYPE,
                resource_id: subject_id.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarrantOp {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarrantWrite {
    pub op: WarrantOp,
    #[serde(flatten)]
    pub tuple: CheckTuple,
}

/// Remote relationship store
#[async_trait]
pub trait PolicyBackend: Send + Sync {
    /// One decision per tuple, in order
    async fn check(&self, tuples: &[CheckTuple]) -> Result<Vec<bool>, UpstreamError>;

    async fn write(&self, writes: &[WarrantWrite]) -> Result<(), UpstreamError>;
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    checks: &'a [CheckTuple],
}

#[derive(Debug, Deserialize)]
struct CheckResult {
    result: String,
}

impl CheckResult {
    fn is_authorized(&self) -> bool {
        self.result == "authorized"
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CheckResponse {
    Batch { results: Vec<CheckResult> },
    Single(CheckResult),
}

/// Map a check response onto `expected` decisions; missing entries deny
fn decisions(body: &[u8], expected: usize) -> Result<Vec<bool>, UpstreamError> {
    let response: CheckResponse =
        serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    let results = match response {
        CheckResponse::Batch { results } => results,
        CheckResponse::Single(result) if expected == 1 => vec![result],
        CheckResponse::Single(_) => {
            return Err(UpstreamError::Decode(format!(
                "single result returned for a batch of {expected}"
            )));
        }
    };
    Ok((0..expected)
        .map(|i| results.get(i).is_some_and(CheckResult::is_authorized))
        .collect())
}

/// Policy backend speaking the FGA REST API
pub struct HttpPolicyBackend {
    client: reqwest::Client,
    check_url: Url,
    warrants_url: Url,
    api_key: String,
}

impl std::fmt::Debug for HttpPolicyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPolicyBackend")
            .field("check_url", &self.check_url.as_str())
            .field("warrants_url", &self.warrants_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpPolicyBackend {
    pub fn new(base_url: &Url, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = |path: &str| {
            join_path(base_url, path).map_err(|e| UpstreamError::Decode(e.to_string()))
        };
        let check_url = endpoint("check")?;
        let warrants_url = endpoint("warrants")?;
        Ok(Self {
            client,
            check_url,
            warrants_url,
            api_key,
        })
    }

    async fn post<T: Serialize + Sync + ?Sized>(
        &self,
        url: &Url,
        body: &T,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(UpstreamError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl PolicyBackend for HttpPolicyBackend {
    async fn check(&self, tuples: &[CheckTuple]) -> Result<Vec<bool>, UpstreamError> {
        let response = self
            .post(&self.check_url, &CheckRequest { checks: tuples })
            .await?;
        let body = response.bytes().await?;
        decisions(&body, tuples.len())
    }

    async fn write(&self, writes: &[WarrantWrite]) -> Result<(), UpstreamError> {
        self.post(&self.warrants_url, writes).await.map(|_| ())
    }
}

fn record_check(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    crate::observability::record_policy_check(outcome);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

#[derive(Debug, Default)]
struct KeyEpoch {
    epoch: u64,
    pending: usize,
}

/// Cached policy checks with race-safe invalidation
pub struct PolicyClient {
    backend: Option<Arc<dyn PolicyBackend>>,
    cache: Arc<dyn CacheProvider>,
    ttl: Duration,
    fail_open: bool,
    epochs: Mutex<HashMap<String, KeyEpoch>>,
}

impl std::fmt::Debug for PolicyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyClient")
            .field("configured", &self.is_configured())
            .field("ttl", &self.ttl)
            .field("fail_open", &self.fail_open)
            .finish_non_exhaustive()
    }
}

impl PolicyClient {
    pub fn new(
        backend: Option<Arc<dyn PolicyBackend>>,
        cache: Arc<dyn CacheProvider>,
        ttl: Duration,
        fail_open: bool,
    ) -> Self {
        Self {
            backend,
            cache,
            ttl,
            fail_open,
            epochs: Mutex::new(HashMap::new()),
        }
    }

    /// Client without a backend: checks allow, writes report failure
    pub fn unconfigured(cache: Arc<dyn CacheProvider>) -> Self {
        let config = PolicyConfig::new();
        Self::new(None, cache, config.cache_ttl, config.fail_open)
    }

    /// HTTP-backed client when an API key is configured
    pub fn from_config(
        config: &PolicyConfig,
        cache: Arc<dyn CacheProvider>,
    ) -> Result<Self, UpstreamError> {
        let backend = match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                let base = config
                    .effective_base_url()
                    .map_err(|e| UpstreamError::Decode(e.to_string()))?;
                let backend: Arc<dyn PolicyBackend> =
                    Arc::new(HttpPolicyBackend::new(&base, key.to_string(), config.timeout)?);
                Some(backend)
            }
            None => None,
        };
        Ok(Self::new(backend, cache, config.cache_ttl, config.fail_open))
    }

    pub const fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn check(&self, subject_id: &str, tool: &str) -> bool {
        let Some(backend) = &self.backend else {
            return true;
        };

        let key = CacheKey::policy_decision(tool, subject_id);
        if let Some(decision) = self.cached(&key).await {
            record_check("cached");
            return decision;
        }

        let epoch = self.begin(&key).await;
        match backend
            .check(&[CheckTuple::can_execute(tool, subject_id)])
            .await
        {
            Ok(results) => {
                let decision = results.first().copied().unwrap_or(false);
                self.finish(&key, epoch, Some(decision)).await;
                record_check(if decision { "authorized" } else { "denied" });
                decision
            }
            Err(e) => {
                self.finish(&key, epoch, None).await;
                self.fallback(&e, 1)
            }
        }
    }

    /// Decisions for each distinct tool, sending only cache misses upstream
    pub async fn batch_check(&self, subject_id: &str, tools: &[&str]) -> HashMap<String, bool> {
        let tools: BTreeSet<&str> = tools.iter().copied().collect();
        let Some(backend) = &self.backend else {
            return tools.into_iter().map(|t| (t.to_string(), true)).collect();
        };

        let mut results = HashMap::with_capacity(tools.len());
        let mut misses = Vec::new();
        for tool in tools {
            let key = CacheKey::policy_decision(tool, subject_id);
            if let Some(decision) = self.cached(&key).await {
                record_check("cached");
                results.insert(tool.to_string(), decision);
            } else {
                let epoch = self.begin(&key).await;
                misses.push((tool, key, epoch));
            }
        }

        if misses.is_empty() {
            return results;
        }

        let tuples: Vec<CheckTuple> = misses
            .iter()
            .map(|(tool, _, _)| CheckTuple::can_execute(tool, subject_id))
            .collect();

        match backend.check(&tuples).await {
            Ok(decisions) => {
                for (i, (tool, key, epoch)) in misses.into_iter().enumerate() {
                    let decision = decisions.get(i).copied().unwrap_or(false);
                    self.finish(&key, epoch, Some(decision)).await;
                    record_check(if decision { "authorized" } else { "denied" });
                    results.insert(tool.to_string(), decision);
                }
            }
            Err(e) => {
                let decision = self.fallback(&e, misses.len());
                for (tool, key, epoch) in misses {
                    self.finish(&key, epoch, None).await;
                    results.insert(tool.to_string(), decision);
                }
            }
        }

        results
    }

    pub async fn grant(&self, subject_id: &str, tool: &str) -> bool {
        self.write(WarrantOp::Create, subject_id, &[tool]).await
    }

    pub async fn revoke(&self, subject_id: &str, tool: &str) -> bool {
        self.write(WarrantOp::Delete, subject_id, &[tool]).await
    }

    /// Grant several tools in one request
    pub async fn grant_many(&self, subject_id: &str, tools: &[&str]) -> bool {
        if tools.is_empty() {
            return true;
        }
        self.write(WarrantOp::Create, subject_id, tools).await
    }

    async fn write(&self, op: WarrantOp, subject_id: &str, tools: &[&str]) -> bool {
        let Some(backend) = &self.backend else {
            tracing::debug!(subject = subject_id, "Policy service not configured; write skipped");
            return false;
        };

        let writes: Vec<WarrantWrite> = tools
            .iter()
            .map(|tool| WarrantWrite {
                op,
                tuple: CheckTuple::can_execute(tool, subject_id),
            })
            .collect();

        if let Err(e) = backend.write(&writes).await {
            tracing::warn!(
                subject = subject_id,
                op = ?op,
                tools = tools.len(),
                error = %e,
                "Policy write failed"
            );
            return false;
        }

        for tool in tools {
            self.invalidate(&CacheKey::policy_decision(tool, subject_id))
                .await;
        }
        tracing::info!(subject = subject_id, op = ?op, tools = tools.len(), "Policy updated");
        true
    }

    fn fallback(&self, error: &UpstreamError, count: usize) -> bool {
        tracing::warn!(
            error = %error,
            timeout = error.is_timeout(),
            checks = count,
            fail_open = self.fail_open,
            "Policy check failed; applying fallback decision"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_policy_fallback();
        self.fail_open
    }

    async fn cached(&self, key: &CacheKey) -> Option<bool> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Policy cache read failed");
                None
            }
        }
    }

    /// Register a pending check and return the epoch it started under
    async fn begin(&self, key: &CacheKey) -> u64 {
        let mut epochs = self.epochs.lock().await;
        let entry = epochs.entry(key.to_key_string()).or_default();
        entry.pending += 1;
        entry.epoch
    }

    /// Store `decision` if no write invalidated the key since `begin`
    async fn finish(&self, key: &CacheKey, epoch: u64, decision: Option<bool>) {
        let key_str = key.to_key_string();
        let mut epochs = self.epochs.lock().await;
        let current = epochs.get(&key_str).map_or(0, |e| e.epoch);

        match decision {
            Some(_) if current != epoch => {
                tracing::debug!(key = %key, "Decision superseded by a policy write; not cached");
            }
            Some(decision) => {
                let value: &[u8] = if decision { b"true" } else { b"false" };
                if let Err(e) = self.cache.set(key, value, Some(self.ttl)).await {
                    tracing::warn!(key = %key, error = %e, "Policy cache write failed");
                }
            }
            None => {}
        }

        if let Some(entry) = epochs.get_mut(&key_str) {
            entry.pending = entry.pending.saturating_sub(1);
            if entry.pending == 0 {
                epochs.remove(&key_str);
            }
        }
    }

    async fn invalidate(&self, key: &CacheKey) {
        let mut epochs = self.epochs.lock().await;
        // Checks that start after this point read the fresh state.
        if let Some(entry) = epochs.get_mut(&key.to_key_string()) {
            entry.epoch += 1;
        }
        if let Err(e) = self.cache.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Policy cache invalidation failed");
        }
        drop(epochs);
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.epochs.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::{Value, json};

    use super::*;
    use crate::auth::testing::{CapturedLogs, FakePolicyBackend};
    use crate::cache::InMemoryCache;

    fn client(backend: &Arc<FakePolicyBackend>) -> (PolicyClient, Arc<InMemoryCache>) {
        let cache = Arc::new(InMemoryCache::new());
        let client = PolicyClient::new(
            Some(backend.clone()),
            cache.clone(),
            Duration::from_secs(60),
            true,
        );
        (client, cache)
    }

    #[test]
    fn test_tuple_wire_shape() {
        let write = WarrantWrite {
            op: WarrantOp::Create,
            tuple: CheckTuple::can_execute("list_tags", "user_1"),
        };
        assert_eq!(
            serde_json::to_value(&write).unwrap(),
            json!({
                "op": "create",
                "resource_type": "mcp_tool",
                "resource_id": "list_tags",
                "relation": "can_execute",
                "subject": {"resource_type": "user", "resource_id": "user_1"}
            })
        );
    }

    #[test]
    fn test_decisions_parsing() {
        let body = br#"{"results":[{"result":"authorized"},{"result":"not_authorized"}]}"#;
        assert_eq!(decisions(body, 2).unwrap(), vec![true, false]);
        assert_eq!(decisions(body, 3).unwrap(), vec![true, false, false]);
        assert_eq!(
            decisions(br#"{"result":"authorized"}"#, 1).unwrap(),
            vec![true]
        );
        assert!(decisions(br#"{"result":"authorized"}"#, 2).is_err());
        assert!(decisions(b"oops", 1).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client_allows_everything() {
        let client = PolicyClient::unconfigured(Arc::new(InMemoryCache::new()));
        assert!(!client.is_configured());
        assert!(client.check("u", "delete_list").await);
        let batch = client.batch_check("u", &["a", "b"]).await;
        assert!(batch.values().all(|allowed| *allowed));
        assert!(!client.grant("u", "a").await);
        assert!(!client.revoke("u", "a").await);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let cache: Arc<dyn CacheProvider> = Arc::new(InMemoryCache::new());
        let unconfigured = PolicyClient::from_config(&PolicyConfig::new(), cache.clone()).unwrap();
        assert!(!unconfigured.is_configured());

        let config = PolicyConfig {
            api_key: Some("sk_test".into()),
            ..PolicyConfig::new()
        };
        assert!(PolicyClient::from_config(&config, cache).unwrap().is_configured());
    }

    #[tokio::test]
    async fn test_repeated_check_hits_cache() {
        let backend = Arc::new(FakePolicyBackend::default());
        backend.allow("list_tags", "user_1");
        let (client, _) = client(&backend);

        assert!(client.check("user_1", "list_tags").await);
        assert!(client.check("user_1", "list_tags").await);
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denial_is_cached_too() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, cache) = client(&backend);

        assert!(!client.check("user_1", "delete_list").await);
        assert!(!client.check("user_1", "delete_list").await);
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
        let stored = cache
            .get(&CacheKey::policy_decision("delete_list", "user_1"))
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some(&b"false"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_decision_expires() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        client.check("u", "t").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        client.check("u", "t").await;

        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_grant_then_check_sees_new_decision() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        assert!(!client.check("user_1", "create_list").await);
        assert!(client.grant("user_1", "create_list").await);
        assert!(client.check("user_1", "create_list").await);
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 2);

        assert!(client.revoke("user_1", "create_list").await);
        assert!(!client.check("user_1", "create_list").await);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        assert!(!client.check("u", "t").await);
        backend.write_failing.store(true, Ordering::SeqCst);

        assert!(!client.grant("u", "t").await);
        assert!(!client.check("u", "t").await);
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_failure_fails_open_without_caching() {
        let backend = Arc::new(FakePolicyBackend::default());
        backend.failing.store(true, Ordering::SeqCst);
        let (client, _) = client(&backend);

        assert!(client.check("u", "t").await);

        backend.failing.store(false, Ordering::SeqCst);
        assert!(!client.check("u", "t").await);
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_failure_can_fail_closed() {
        let backend = Arc::new(FakePolicyBackend::default());
        backend.failing.store(true, Ordering::SeqCst);
        let client = PolicyClient::new(
            Some(backend.clone()),
            Arc::new(InMemoryCache::new()),
            Duration::from_secs(60),
            false,
        );

        assert!(!client.check("u", "t").await);
        assert!(client.batch_check("u", &["a"]).await.values().all(|a| !a));
    }

    #[tokio::test]
    async fn test_batch_sends_only_misses() {
        let backend = Arc::new(FakePolicyBackend::default());
        backend.allow("list_tags", "u");
        backend.allow("get_list", "u");
        let (client, _) = client(&backend);

        assert!(client.check("u", "list_tags").await);
        let results = client
            .batch_check("u", &["list_tags", "get_list", "delete_list"])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results["list_tags"]);
        assert!(results["get_list"]);
        assert!(!results["delete_list"]);
        assert_eq!(*backend.batch_sizes.lock(), vec![1, 2]);

        // Every entry is now cached individually.
        client.batch_check("u", &["list_tags", "get_list", "delete_list"]).await;
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        assert!(client.batch_check("u", &[]).await.is_empty());
        assert_eq!(backend.check_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_deduplicates_tools() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        let results = client.batch_check("u", &["a", "a", "b"]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(*backend.batch_sizes.lock(), vec![2]);
    }

    #[tokio::test]
    async fn test_grant_many_invalidates_every_tool() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        client.batch_check("u", &["a", "b"]).await;
        assert!(client.grant_many("u", &["a", "b"]).await);
        let results = client.batch_check("u", &["a", "b"]).await;

        assert!(results["a"] && results["b"]);
        assert_eq!(backend.write_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_check_does_not_overwrite_invalidation() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (entered, release) = backend.hold_next_check();
        let (client, cache) = client(&backend);
        let client = Arc::new(client);

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.check("u", "t").await })
        };

        // The remote call has answered "denied" and is parked before storing.
        entered.notified().await;
        assert!(client.grant("u", "t").await);
        release.notify_one();

        assert!(!pending.await.unwrap());
        assert!(
            cache
                .get(&CacheKey::policy_decision("t", "u"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(client.check("u", "t").await);
        assert_eq!(client.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_epochs_released_once_checks_settle() {
        let backend = Arc::new(FakePolicyBackend::default());
        let (client, _) = client(&backend);

        for i in 0..50 {
            let subject = format!("user_{i}");
            client.check(&subject, "list_tags").await;
            client.batch_check(&subject, &["get_bookmark", "search_bookmarks"]).await;
            client.grant(&subject, "list_tags").await;
            client.revoke(&subject, "delete_list").await;
        }
        assert_eq!(client.tracked_keys().await, 0);

        backend.failing.store(true, Ordering::SeqCst);
        client.check("user_x", "list_tags").await;
        client.batch_check("user_x", &["a", "b"]).await;
        assert_eq!(client.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_check_failure_logs_warning() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let backend = Arc::new(FakePolicyBackend::default());
        backend.failing.store(true, Ordering::SeqCst);
        let (client, _) = client(&backend);

        assert!(client.check("user_1", "list_tags").await);

        let output = logs.contents();
        let line = output
            .lines()
            .find(|l| l.contains("Policy check failed; applying fallback decision"))
            .unwrap_or_else(|| panic!("no fallback warning in:\n{output}"));
        assert!(line.contains("WARN"), "{line}");
        assert!(line.contains("fail_open=true"), "{line}");
        assert!(line.contains("upstream returned HTTP 500"), "{line}");
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{addr}/fga/v1")).unwrap()
    }

    #[tokio::test]
    async fn test_http_backend_server_error_fails_open() {
        let router = Router::new().route(
            "/fga/v1/check",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;
        let config = PolicyConfig {
            base_url: Some(base),
            api_key: Some("sk_test".into()),
            ..PolicyConfig::new()
        };
        let cache = Arc::new(InMemoryCache::new());
        let client = PolicyClient::from_config(&config, cache.clone()).unwrap();

        assert!(client.check("user_1", "delete_list").await);
        assert!(
            cache
                .get(&CacheKey::policy_decision("delete_list", "user_1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_http_backend_unreachable_fails_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let base = Url::parse(&format!("http://{addr}/fga/v1")).unwrap();

        let backend =
            HttpPolicyBackend::new(&base, "sk_test".into(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            backend.check(&[CheckTuple::can_execute("t", "u")]).await,
            Err(UpstreamError::Http(_))
        ));

        let client = PolicyClient::new(
            Some(Arc::new(backend)),
            Arc::new(InMemoryCache::new()),
            Duration::from_secs(60),
            true,
        );
        assert!(client.check("u", "delete_list").await);
        assert!(client.batch_check("u", &["a", "b"]).await.values().all(|a| *a));
    }

    #[tokio::test]
    async fn test_http_backend_timeout_fails_open() {
        let router = Router::new().route(
            "/fga/v1/check",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::Json(json!({"results": [{"result": "not_authorized"}]}))
            }),
        );
        let base = serve(router).await;
        let backend =
            HttpPolicyBackend::new(&base, "sk_test".into(), Duration::from_millis(200)).unwrap();

        let err = backend
            .check(&[CheckTuple::can_execute("t", "u")])
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err}");

        let cache = Arc::new(InMemoryCache::new());
        let client = PolicyClient::new(
            Some(Arc::new(backend)),
            cache.clone(),
            Duration::from_secs(60),
            true,
        );
        let started = std::time::Instant::now();
        assert!(client.check("u", "t").await);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(
            cache
                .get(&CacheKey::policy_decision("t", "u"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_http_backend_round_trip() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::<Value>::new()));
        let router = {
            let check_seen = Arc::clone(&seen);
            let write_seen = Arc::clone(&seen);
            Router::new()
                .route(
                    "/fga/v1/check",
                    post(move |axum::Json(body): axum::Json<Value>| {
                        let seen = Arc::clone(&check_seen);
                        async move {
                            let count = body["checks"].as_array().map_or(0, Vec::len);
                            seen.lock().push(body);
                            let results: Vec<Value> = (0..count)
                                .map(|i| {
                                    json!({"result": if i == 0 { "authorized" } else { "not_authorized" }})
                                })
                                .collect();
                            axum::Json(json!({ "results": results }))
                        }
                    }),
                )
                .route(
                    "/fga/v1/warrants",
                    post(move |axum::Json(body): axum::Json<Value>| {
                        let seen = Arc::clone(&write_seen);
                        async move {
                            seen.lock().push(body);
                            StatusCode::OK
                        }
                    }),
                )
        };
        let base = serve(router).await;
        let backend =
            HttpPolicyBackend::new(&base, "sk_test".into(), Duration::from_secs(5)).unwrap();

        let decisions = backend
            .check(&[
                CheckTuple::can_execute("a", "u"),
                CheckTuple::can_execute("b", "u"),
            ])
            .await
            .unwrap();
        assert_eq!(decisions, vec![true, false]);

        backend
            .write(&[WarrantWrite {
                op: WarrantOp::Delete,
                tuple: CheckTuple::can_execute("a", "u"),
            }])
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0]["checks"][1]["resource_id"], "b");
        assert_eq!(seen[1][0]["op"], "delete");
        assert_eq!(seen[1][0]["subject"]["resource_type"], "user");
    }
}
