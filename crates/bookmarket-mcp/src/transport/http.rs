//! Streamable HTTP transport implementation

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{Router, middleware};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthStack, authenticate, discovery_router};
use crate::config::Config;
use crate::server::BookmarketServer;
use crate::{Error, Result};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
const MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Router serving MCP under `/mcp` plus health, metrics and discovery routes
pub fn build_router(
    handler: BookmarketServer,
    auth: &AuthStack,
    config: &Config,
    cancellation_token: CancellationToken,
) -> Result<Router> {
    let session_manager = Arc::new(LocalSessionManager::default());
    let mut server_config = StreamableHttpServerConfig::default();
    server_config.cancellation_token = cancellation_token;
    let mcp_service =
        StreamableHttpService::new(move || Ok(handler.clone()), session_manager, server_config);

    let mut mcp = Router::new().nest_service("/mcp", mcp_service);
    if let Some(state) = auth.auth_state(&config.resource_url) {
        mcp = mcp.layer(middleware::from_fn_with_state(state, authenticate));
    }

    #[allow(unused_mut)]
    let mut app = Router::new().route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(metrics_handler));
    }

    if let Some(docs) = auth.discovery(&config.resource_url)? {
        app = app.merge(discovery_router(docs));
    }

    Ok(app
        .merge(mcp)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(build_cors_layer(config.transport.cors_origin.as_deref())))
}

/// Run the streamable HTTP server until `shutdown` resolves
pub async fn run_http(
    handler: BookmarketServer,
    auth: &AuthStack,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = config.transport.bind_addr();
    let cancellation_token = CancellationToken::new();

    emit_security_warnings(
        config.transport.http_host,
        config.transport.cors_origin.as_deref(),
        auth.is_enabled(),
    );

    let app = build_router(handler, auth, config, cancellation_token.clone())?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!(
        %addr,
        resource = %config.resource_url,
        auth = auth.is_enabled(),
        "HTTP server listening"
    );

    // Spawn shutdown handler
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        shutdown.await;
        token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn build_cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(str::trim) {
        Some("*") => AllowOrigin::any(),
        Some(origins) => {
            let values: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty() && *o != "*")
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = o, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            if values.is_empty() {
                AllowOrigin::exact(HeaderValue::from_static(DEFAULT_CORS_ORIGIN))
            } else {
                AllowOrigin::list(values)
            }
        }
        None => AllowOrigin::exact(HeaderValue::from_static(DEFAULT_CORS_ORIGIN)),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            MCP_SESSION_ID,
            MCP_PROTOCOL_VERSION,
        ])
        .expose_headers([MCP_SESSION_ID, header::WWW_AUTHENTICATE])
}

fn emit_security_warnings(host: IpAddr, cors_origin: Option<&str>, auth_enabled: bool) {
    let is_non_loopback = !host.is_loopback();
    let is_all_interfaces =
        host == IpAddr::V4(Ipv4Addr::UNSPECIFIED) || host == IpAddr::V6(Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces. \
             This exposes the server to all network interfaces."
        );
    } else if is_non_loopback {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if !auth_enabled && is_non_loopback {
        tracing::warn!(
            "SECURITY WARNING: HTTP server accessible from network without authentication. \
             Set BOOKMARKET_ISSUER to require OAuth bearer tokens."
        );
    }

    match cors_origin {
        None => tracing::info!(
            "CORS origin not configured (MCP_CORS_ORIGIN). \
             Using restrictive default: {DEFAULT_CORS_ORIGIN}"
        ),
        Some("*") => tracing::warn!("CORS allows any origin"),
        Some(_) => {}
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
