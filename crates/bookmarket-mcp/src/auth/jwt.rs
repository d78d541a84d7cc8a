//! Bearer token verification

use std::sync::Arc;

use jsonwebtoken::{Validation, decode, decode_header};

use super::claims::{Claims, RawClaims};
use super::config::JwtConfig;
use super::error::{Result, VerificationError};
use super::jwks::KeySetCache;

/// Validates a token's signature and standard claims, then normalizes claims
pub struct TokenVerifier {
    config: JwtConfig,
    keys: Arc<KeySetCache>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.config.issuer_str())
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    #[must_use]
    pub const fn new(config: JwtConfig, keys: Arc<KeySetCache>) -> Self {
        Self { config, keys }
    }

    pub const fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub async fn verify(&self, token: &str) -> Result<Claims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerificationError::MissingToken);
        }

        let header = decode_header(token).map_err(|_| VerificationError::MalformedToken)?;

        let keys = self.keys.signing_keys().await?;
        let key = keys.select(header.kid.as_deref(), header.alg)?;

        let validation = self.validation(key.algorithm);
        let data = decode::<RawClaims>(token, &key.key, &validation)?;

        Claims::try_from(data.claims)
    }

    fn validation(&self, algorithm: jsonwebtoken::Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = self.config.clock_skew.as_secs();

        if self.config.validate_issuer {
            let issuer = self.config.issuer_str();
            validation.set_issuer(&[issuer.to_string(), format!("{issuer}/")]);
        }

        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.config.audience);
        }

        validation
    }
}
