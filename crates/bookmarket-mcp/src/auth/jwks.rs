//! JWKS fetching and caching

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use super::error::{KeyFetchError, VerificationError};

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC, OKP)
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC / OKP components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Upstream that publishes the signing keys
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError>;
}

/// Fetches `{"keys": [...]}` over HTTPS
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    jwks_uri: Url,
    client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(jwks_uri: Url, timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { jwks_uri, client })
    }

    pub const fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Fetching JWKS");

        let response = self.client.get(self.jwks_uri.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| KeyFetchError::Malformed(e.to_string()))
    }
}

/// One usable verification key
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of the provider's keys
#[derive(Debug)]
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl SigningKeySet {
    /// Decode every supported key; entries of unknown type are skipped
    pub fn from_jwks(jwks: &JwkSet, fetched_at: Instant) -> Result<Self, KeyFetchError> {
        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            if let Some((key, algorithm)) = decode_jwk(jwk)? {
                keys.push(SigningKey {
                    kid: jwk.kid.clone(),
                    algorithm,
                    key,
                });
            }
        }
        Ok(Self { keys, fetched_at })
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub const fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Select the key for a token header
    ///
    /// A `kid` must name a key of the same algorithm. Without a `kid`, the first
    /// unnamed key of that algorithm is used.
    pub fn select(&self, kid: Option<&str>, alg: Algorithm) -> Result<&SigningKey, VerificationError> {
        match kid {
            Some(kid) => {
                let named = self
                    .keys
                    .iter()
                    .find(|k| k.kid.as_deref() == Some(kid))
                    .ok_or_else(|| VerificationError::UnknownKeyId(kid.to_string()))?;
                if named.algorithm == alg {
                    Ok(named)
                } else {
                    Err(VerificationError::NoMatchingKey)
                }
            }
            None => self
                .keys
                .iter()
                .find(|k| k.kid.is_none() && k.algorithm == alg)
                .ok_or(VerificationError::NoMatchingKey),
        }
    }
}

/// Process-wide signing key cache
///
/// Keys are fetched on first use and kept for `ttl`. Refreshes are
/// single-flight and replace the whole set atomically. A failed fetch is
/// returned to the caller and to everyone who queued behind it: expired
/// keys are never served.
pub struct KeySetCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    current: ArcSwapOption<SigningKeySet>,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Completed fetch attempts, successful or not
    attempts: AtomicU64,
    last_failure: Mutex<Option<KeyFetchError>>,
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("ttl", &self.ttl)
            .field("keys_count", &self.current.load_full().map(|s| s.len()))
            .finish_non_exhaustive()
    }
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Current signing keys, fetching them if absent or expired
    pub async fn signing_keys(&self) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        if let Some(set) = self.fresh() {
            return Ok(set);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(set) = self.fresh() {
            return Ok(set);
        }
        // Or failed: share its outcome instead of queueing another fetch.
        if self.attempts.load(Ordering::Acquire) != seen
            && let Some(err) = self.last_failure.lock().clone()
        {
            return Err(err);
        }
        self.refresh_locked().await
    }

    fn fresh(&self) -> Option<Arc<SigningKeySet>> {
        self.current
            .load_full()
            .filter(|set| set.fetched_at.elapsed() < self.ttl)
    }

    async fn refresh_locked(&self) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        let outcome = self.fetch_set().await;
        *self.last_failure.lock() = outcome.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn fetch_set(&self) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        let jwks = match self.source.fetch().await {
            Ok(jwks) => jwks,
            Err(e) => {
                self.current.store(None);
                tracing::warn!(error = %e, "JWKS refresh failed");
                return Err(e);
            }
        };

        let set = match SigningKeySet::from_jwks(&jwks, Instant::now()) {
            Ok(set) => Arc::new(set),
            Err(e) => {
                self.current.store(None);
                tracing::warn!(error = %e, "JWKS document rejected");
                return Err(e);
            }
        };
        self.current.store(Some(Arc::clone(&set)));

        tracing::info!(keys_count = set.len(), "JWKS refreshed successfully");
        Ok(set)
    }
}

fn required<'a>(value: Option<&'a String>, what: &str) -> Result<&'a str, KeyFetchError> {
    value
        .map(String::as_str)
        .ok_or_else(|| KeyFetchError::Malformed(format!("missing '{what}'")))
}

fn decode_jwk(jwk: &Jwk) -> Result<Option<(DecodingKey, Algorithm)>, KeyFetchError> {
    if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
        return Ok(None);
    }

    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("PS256") => Algorithm::PS256,
        Some("PS384") => Algorithm::PS384,
        Some("PS512") => Algorithm::PS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        Some("EdDSA") => Algorithm::EdDSA,
        None => match (jwk.kty.as_str(), jwk.crv.as_deref()) {
            ("RSA", _) => Algorithm::RS256,
            ("EC", Some("P-256")) => Algorithm::ES256,
            ("EC", Some("P-384")) => Algorithm::ES384,
            ("OKP", Some("Ed25519")) => Algorithm::EdDSA,
            _ => return Ok(None),
        },
        Some(other) => {
            tracing::debug!(alg = other, "Skipping key with unsupported algorithm");
            return Ok(None);
        }
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = required(jwk.n.as_ref(), "n")?;
            let e = required(jwk.e.as_ref(), "e")?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| KeyFetchError::Malformed(format!("invalid RSA components: {e}")))?
        }
        "EC" => {
            let x = required(jwk.x.as_ref(), "x")?;
            let y = required(jwk.y.as_ref(), "y")?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| KeyFetchError::Malformed(format!("invalid EC components: {e}")))?
        }
        "OKP" => {
            let x = required(jwk.x.as_ref(), "x")?;
            DecodingKey::from_ed_components(x)
                .map_err(|e| KeyFetchError::Malformed(format!("invalid OKP components: {e}")))?
        }
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return Ok(None);
        }
    };

    Ok(Some((key, alg)))
}
