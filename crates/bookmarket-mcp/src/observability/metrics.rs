//! Prometheus metrics for bookmarket-mcp

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Server metrics
const METRIC_UPTIME: &str = "bookmarket_mcp_uptime_seconds";
const METRIC_INFO: &str = "bookmarket_mcp_info";
const METRIC_TOOL_CALLS: &str = "bookmarket_mcp_tool_calls_total";

// Authorization metrics
const METRIC_AUTH_ATTEMPTS: &str = "bookmarket_mcp_auth_attempts_total";
const METRIC_ROLE_RESOLUTIONS: &str = "bookmarket_mcp_role_resolutions_total";
const METRIC_POLICY_CHECKS: &str = "bookmarket_mcp_policy_checks_total";
const METRIC_POLICY_FALLBACKS: &str = "bookmarket_mcp_policy_fallbacks_total";

// Cache metrics
const METRIC_CACHE_HITS: &str = "bookmarket_mcp_cache_hits_total";
const METRIC_CACHE_MISSES: &str = "bookmarket_mcp_cache_misses_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Server uptime in seconds");
    describe_gauge!(METRIC_INFO, "Server information (always 1)");
    describe_counter!(METRIC_TOOL_CALLS, "Tool calls by tool and outcome");

    describe_counter!(METRIC_AUTH_ATTEMPTS, "Bearer authentication attempts by outcome");
    describe_counter!(METRIC_ROLE_RESOLUTIONS, "Role resolutions by source");
    describe_counter!(METRIC_POLICY_CHECKS, "Policy decisions by outcome");
    describe_counter!(
        METRIC_POLICY_FALLBACKS,
        "Policy decisions answered by the fallback because the service failed"
    );

    describe_counter!(METRIC_CACHE_HITS, "Total cache hits");
    describe_counter!(METRIC_CACHE_MISSES, "Total cache misses");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// `outcome` is one of success, missing_token, invalid_token.
pub fn record_auth_attempt(outcome: &'static str) {
    counter!(METRIC_AUTH_ATTEMPTS, "outcome" => outcome).increment(1);
}

pub fn record_role_resolution(source: &'static str) {
    counter!(METRIC_ROLE_RESOLUTIONS, "source" => source).increment(1);
}

pub fn record_policy_check(outcome: &'static str) {
    counter!(METRIC_POLICY_CHECKS, "outcome" => outcome).increment(1);
}

pub fn record_policy_fallback() {
    counter!(METRIC_POLICY_FALLBACKS).increment(1);
}

pub fn record_tool_call(tool: &str, outcome: &'static str) {
    counter!(
        METRIC_TOOL_CALLS,
        "tool" => tool.to_owned(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Record a cache hit.
pub fn record_cache_hit(cache: &str) {
    counter!(METRIC_CACHE_HITS, "cache" => cache.to_owned()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss(cache: &str) {
    counter!(METRIC_CACHE_MISSES, "cache" => cache.to_owned()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_without_init() {
        let output = render_metrics();
        assert!(output.is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_auth_attempt("success");
        record_tool_call("list_tags", "denied");
        record_policy_fallback();
        record_cache_hit("policy_decision");
    }
}
