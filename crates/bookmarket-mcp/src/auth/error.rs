//! Authentication and authorization error types

use thiserror::Error;

/// Signing keys could not be obtained from the identity provider
#[derive(Debug, Clone, Error)]
pub enum KeyFetchError {
    #[error("JWKS request failed: {0}")]
    Http(String),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    #[error("JWKS document is malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for KeyFetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// A bearer token was rejected. Always terminal for the request.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("no bearer token provided")]
    MissingToken,

    #[error("malformed token")]
    MalformedToken,

    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    #[error("no signing key for algorithm")]
    NoMatchingKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    TokenExpired,

    #[error("token not yet valid")]
    TokenNotYetValid,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("missing claim: {0}")]
    MissingClaim(String),

    #[error("signing keys unavailable: {0}")]
    KeyFetch(#[from] KeyFetchError),
}

impl VerificationError {
    /// Short label for logs and metrics; never includes token material
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed",
            Self::UnknownKeyId(_) => "unknown_kid",
            Self::NoMatchingKey => "no_matching_key",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "expired",
            Self::TokenNotYetValid => "not_yet_valid",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
            Self::MissingClaim(_) => "missing_claim",
            Self::KeyFetch(_) => "key_fetch",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::ImmatureSignature => Self::TokenNotYetValid,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::MalformedToken,
        }
    }
}

/// A membership or policy service call failed. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;
