//! TOML configuration file loading

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::{AuthKind, ConfigBuilder, TransportMode};
use crate::Result;
use crate::auth::ResolverStrategy;
use crate::cache::CacheBackend;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./bookmarket-mcp.toml",
    "~/.config/bookmarket-mcp/config.toml",
    "/etc/bookmarket-mcp/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| crate::Error::Config(format!("Invalid {field}: {e}")))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    // Transport settings
    if let Some(transport) = config.transport {
        if let Some(mode_str) = transport.mode {
            let mode: TransportMode = mode_str.parse().unwrap_or_default();
            builder = builder.transport_mode(mode);
        }

        if let Some(host_str) = transport.http_host {
            let host = host_str.parse::<IpAddr>().map_err(|e| {
                crate::Error::Config(format!("Invalid transport.http_host '{host_str}': {e}"))
            })?;
            builder = builder.http_host(host);
        }

        if let Some(port) = transport.http_port {
            builder = builder.http_port(port);
        }

        if transport.cors_origin.is_some() {
            builder = builder.cors_origin(transport.cors_origin);
        }
    }

    // Observability settings
    if let Some(obs) = config.observability {
        if let Some(endpoint) = obs.otlp_endpoint {
            builder = builder.otlp_endpoint(Some(endpoint));
        }

        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }

        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    if let Some(auth) = config.auth {
        builder = apply_auth(builder, auth)?;
    }

    // Cache settings
    if let Some(cache) = config.cache {
        if let Some(enabled) = cache.enabled {
            builder = builder.cache_enabled(enabled);
        }

        if let Some(backend) = cache.backend {
            let backend: CacheBackend = backend.parse().unwrap_or_default();
            builder = builder.cache_backend(backend);
        }

        if let Some(max) = cache.max_entries {
            builder = builder.cache_max_entries((max > 0).then_some(max));
        }

        if let Some(secs) = cache.default_ttl_secs {
            builder = builder.cache_default_ttl(Duration::from_secs(secs));
        }
    }

    for (role, permissions) in config.roles {
        builder = builder.role(role, permissions);
    }

    Ok(builder)
}

fn apply_auth(mut builder: ConfigBuilder, auth: AuthFileConfig) -> Result<ConfigBuilder> {
    if let Some(mode) = auth.mode {
        builder = builder.auth_mode(mode.parse::<AuthKind>()?);
    }

    if let Some(issuer) = auth.issuer {
        builder = builder.issuer(url("auth.issuer", &issuer)?);
    }

    if let Some(uri) = auth.jwks_uri {
        builder = builder.jwks_uri(url("auth.jwks_uri", &uri)?);
    }

    if let Some(audience) = auth.audience {
        builder = builder.audience(audience.into_vec());
    }

    if let Some(secs) = auth.clock_skew_secs {
        builder = builder.clock_skew(Duration::from_secs(secs));
    }

    if let Some(secs) = auth.jwks_cache_ttl_secs {
        builder = builder.jwks_cache_ttl(Duration::from_secs(secs));
    }

    if let Some(resource) = auth.resource_url {
        builder = builder.resource_url(url("auth.resource_url", &resource)?);
    }

    if auth.default_organization.is_some() {
        builder = builder.default_organization(auth.default_organization);
    }

    if let Some(strategy) = auth.strategy {
        builder = builder.role_strategy(strategy.parse::<ResolverStrategy>()?);
    }

    if let Some(membership) = auth.membership {
        if let Some(u) = membership.url {
            builder = builder.membership_url(url("auth.membership.url", &u)?);
        }
        if let Some(key) = membership.api_key {
            builder = builder.membership_api_key(key);
        }
        if let Some(secs) = membership.cache_ttl_secs {
            builder = builder.membership_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = membership.timeout_secs {
            builder = builder.membership_timeout(Duration::from_secs(secs));
        }
        if membership.fallback_role.is_some() {
            builder = builder.fallback_role(membership.fallback_role);
        }
    }

    if let Some(policy) = auth.policy {
        if let Some(u) = policy.base_url {
            builder = builder.policy_url(url("auth.policy.base_url", &u)?);
        }
        if let Some(key) = policy.api_key {
            builder = builder.policy_api_key(key);
        }
        if let Some(secs) = policy.cache_ttl_secs {
            builder = builder.policy_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = policy.timeout_secs {
            builder = builder.policy_timeout(Duration::from_secs(secs));
        }
        if let Some(fail_open) = policy.fail_open {
            builder = builder.policy_fail_open(fail_open);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    transport: Option<TransportFileConfig>,
    observability: Option<ObservabilityConfig>,
    auth: Option<AuthFileConfig>,
    cache: Option<CacheFileConfig>,
    #[serde(default)]
    roles: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TransportFileConfig {
    mode: Option<String>,
    http_host: Option<String>,
    http_port: Option<u16>,
    cors_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    otlp_endpoint: Option<String>,
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthFileConfig {
    mode: Option<String>,
    issuer: Option<String>,
    jwks_uri: Option<String>,
    audience: Option<StringOrList>,
    clock_skew_secs: Option<u64>,
    jwks_cache_ttl_secs: Option<u64>,
    resource_url: Option<String>,
    default_organization: Option<String>,
    strategy: Option<String>,
    membership: Option<MembershipFileConfig>,
    policy: Option<PolicyFileConfig>,
}

#[derive(Debug, Deserialize)]
struct MembershipFileConfig {
    url: Option<String>,
    api_key: Option<String>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
    fallback_role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolicyFileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
    fail_open: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CacheFileConfig {
    enabled: Option<bool>,
    backend: Option<String>,
    max_entries: Option<usize>,
    default_ttl_secs: Option<u64>,
}
