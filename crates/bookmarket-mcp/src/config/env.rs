//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;

use url::Url;

use super::builder::{AuthKind, ConfigBuilder, TransportMode};
use crate::Result;
use crate::auth::ResolverStrategy;

/// Environment variable names
mod vars {
    pub const MCP_TRANSPORT: &str = "MCP_TRANSPORT";
    pub const MCP_HTTP_HOST: &str = "MCP_HTTP_HOST";
    pub const MCP_HTTP_PORT: &str = "MCP_HTTP_PORT";
    pub const MCP_CORS_ORIGIN: &str = "MCP_CORS_ORIGIN";
    pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
    pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const MCP_JSON_LOGS: &str = "MCP_JSON_LOGS";
    pub const AUTH_MODE: &str = "BOOKMARKET_AUTH_MODE";
    pub const ISSUER: &str = "BOOKMARKET_ISSUER";
    pub const JWKS_URI: &str = "BOOKMARKET_JWKS_URI";
    pub const AUDIENCE: &str = "BOOKMARKET_AUDIENCE";
    pub const RESOURCE_URL: &str = "BOOKMARKET_RESOURCE_URL";
    pub const DEFAULT_ORGANIZATION: &str = "BOOKMARKET_DEFAULT_ORGANIZATION";
    pub const ROLE_STRATEGY: &str = "BOOKMARKET_ROLE_STRATEGY";
    pub const MEMBERSHIP_URL: &str = "BOOKMARKET_MEMBERSHIP_URL";
    pub const MEMBERSHIP_API_KEY: &str = "BOOKMARKET_MEMBERSHIP_API_KEY";
    pub const ROLE_FALLBACK: &str = "BOOKMARKET_ROLE_FALLBACK";
    pub const POLICY_URL: &str = "BOOKMARKET_POLICY_URL";
    pub const POLICY_API_KEY: &str = "BOOKMARKET_POLICY_API_KEY";
    pub const POLICY_FAIL_OPEN: &str = "BOOKMARKET_POLICY_FAIL_OPEN";
    pub const CACHE_ENABLED: &str = "BOOKMARKET_CACHE_ENABLED";
    pub const CACHE_MAX_ENTRIES: &str = "BOOKMARKET_CACHE_MAX_ENTRIES";
}

fn parse_url(var: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| crate::Error::Config(format!("Invalid {var}: {e}")))
}

/// Set, non-empty variable
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Transport
    if let Some(transport) = var(vars::MCP_TRANSPORT) {
        let mode: TransportMode = transport.parse().unwrap_or_default();
        builder = builder.transport_mode(mode);
    }

    if let Some(host_str) = var(vars::MCP_HTTP_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Some(port_str) = var(vars::MCP_HTTP_PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    if let Some(origin) = var(vars::MCP_CORS_ORIGIN) {
        builder = builder.cors_origin(Some(origin));
    }

    // Telemetry
    if let Some(endpoint) = var(vars::OTEL_EXPORTER_OTLP_ENDPOINT) {
        builder = builder.otlp_endpoint(Some(endpoint));
    }

    if let Some(name) = var(vars::OTEL_SERVICE_NAME) {
        builder = builder.service_name(name);
    }

    if let Some(level) = var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Some(val) = var(vars::MCP_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(vars::MCP_JSON_LOGS, &val)?);
    }

    // Authentication
    if let Some(mode) = var(vars::AUTH_MODE) {
        builder = builder.auth_mode(mode.parse::<AuthKind>()?);
    }

    if let Some(issuer) = var(vars::ISSUER) {
        builder = builder.issuer(parse_url(vars::ISSUER, &issuer)?);
    }

    if let Some(uri) = var(vars::JWKS_URI) {
        builder = builder.jwks_uri(parse_url(vars::JWKS_URI, &uri)?);
    }

    if let Some(audience) = var(vars::AUDIENCE) {
        builder = builder.audience(split_list(&audience));
    }

    if let Some(url) = var(vars::RESOURCE_URL) {
        builder = builder.resource_url(parse_url(vars::RESOURCE_URL, &url)?);
    }

    if let Some(org) = var(vars::DEFAULT_ORGANIZATION) {
        builder = builder.default_organization(Some(org));
    }

    if let Some(strategy) = var(vars::ROLE_STRATEGY) {
        builder = builder.role_strategy(strategy.parse::<ResolverStrategy>()?);
    }

    // Membership directory
    if let Some(url) = var(vars::MEMBERSHIP_URL) {
        builder = builder.membership_url(parse_url(vars::MEMBERSHIP_URL, &url)?);
    }

    if let Some(key) = var(vars::MEMBERSHIP_API_KEY) {
        builder = builder.membership_api_key(key);
    }

    if let Some(role) = var(vars::ROLE_FALLBACK) {
        builder = builder.fallback_role(Some(role));
    }

    // Policy service
    if let Some(url) = var(vars::POLICY_URL) {
        builder = builder.policy_url(parse_url(vars::POLICY_URL, &url)?);
    }

    if let Some(key) = var(vars::POLICY_API_KEY) {
        builder = builder.policy_api_key(key);
    }

    if let Some(val) = var(vars::POLICY_FAIL_OPEN) {
        builder = builder.policy_fail_open(parse_bool(vars::POLICY_FAIL_OPEN, &val)?);
    }

    // Cache
    if let Some(val) = var(vars::CACHE_ENABLED) {
        builder = builder.cache_enabled(parse_bool(vars::CACHE_ENABLED, &val)?);
    }

    if let Some(max_str) = var(vars::CACHE_MAX_ENTRIES)
        && let Ok(max) = max_str.parse::<usize>()
    {
        builder = builder.cache_max_entries((max > 0).then_some(max));
    }

    Ok(builder)
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!(
            "Invalid {var}: '{other}' (expected true/false, 1/0, yes/no or on/off)"
        ))),
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
