//! JWT claims types
//!
//! Identity providers and SDK versions disagree on claim shapes (`aud` as a
//! string or list, `permissions` as a list or an index-keyed object). Everything
//! is normalized into [`Claims`] right after signature validation.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::error::VerificationError;
use super::rbac::{Permission, parse_permissions};

/// Audience can be a single string or array of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(s) => s == value,
            Self::Many(v) => v.iter().any(|s| s == value),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// `permissions` claim as emitted by different encoders
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PermissionsClaim {
    List(Vec<String>),
    /// `{"0": "bookmarks:read", "1": "lists:read"}`
    Object(serde_json::Map<String, serde_json::Value>),
}

impl PermissionsClaim {
    fn values(&self) -> Vec<&str> {
        match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Object(map) => map.values().filter_map(serde_json::Value::as_str).collect(),
        }
    }
}

/// Payload exactly as decoded from the token
#[derive(Debug, Clone, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default, alias = "organization_id")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Option<PermissionsClaim>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
}

/// Verified, normalized token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub issuer: Option<String>,
    pub organization_id: Option<String>,
    pub role: Option<String>,
    /// `Some` only when the token itself carries permissions
    pub permissions: Option<BTreeSet<Permission>>,
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub expires_at: i64,
    pub not_before: Option<i64>,
    pub issued_at: Option<i64>,
}

impl Claims {
    /// True when role resolution can be answered from the token alone
    pub const fn carries_permissions(&self) -> bool {
        self.permissions.is_some()
    }

    /// Minimal claims for a subject; used by tests and stdio tooling
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            issuer: None,
            organization_id: None,
            role: None,
            permissions: None,
            email: None,
            session_id: None,
            expires_at: 0,
            not_before: None,
            issued_at: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawClaims> for Claims {
    type Error = VerificationError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let subject_id =
            non_empty(raw.sub).ok_or_else(|| VerificationError::MissingClaim("sub".into()))?;

        let permissions = match (raw.permissions, raw.scope.as_deref()) {
            (Some(claim), _) => Some(parse_permissions(claim.values())),
            (None, Some(scope)) => {
                let tokens: Vec<&str> = scope
                    .split_whitespace()
                    .filter(|t| t.contains(':'))
                    .collect();
                if tokens.is_empty() {
                    None
                } else {
                    let parsed = parse_permissions(tokens);
                    (!parsed.is_empty()).then_some(parsed)
                }
            }
            (None, None) => None,
        };

        Ok(Self {
            subject_id,
            issuer: raw.iss,
            organization_id: non_empty(raw.org_id),
            role: non_empty(raw.role),
            permissions,
            email: raw.email,
            session_id: raw.sid,
            expires_at: raw.exp,
            not_before: raw.nbf,
            issued_at: raw.iat,
        })
    }
}
