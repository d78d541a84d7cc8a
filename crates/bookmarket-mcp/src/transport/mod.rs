//! Transport layer abstraction
//!
//! Supports stdio (default) and streamable HTTP transports. Bearer
//! authentication only exists on HTTP; a stdio session runs unauthenticated.

#[cfg(feature = "http")]
mod http;

use std::future::Future;

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;

#[cfg(feature = "http")]
pub use http::{build_router, run_http};

use crate::auth::AuthStack;
use crate::config::{Config, TransportMode};
use crate::server::BookmarketServer;
use crate::{Error, Result};

/// Run the MCP server with the configured transport
pub async fn run_transport(
    handler: BookmarketServer,
    auth: &AuthStack,
    config: &Config,
    #[allow(unused_variables)] shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    match config.transport.mode {
        TransportMode::Stdio => {
            if auth.is_enabled() {
                tracing::warn!(
                    "JWT authentication configured but stdio carries no bearer tokens; \
                     permission-gated tools will be hidden"
                );
            }
            run_stdio(handler).await
        }
        #[cfg(feature = "http")]
        TransportMode::Http => http::run_http(handler, auth, config, shutdown).await,
        #[cfg(not(feature = "http"))]
        TransportMode::Http => Err(Error::Transport(
            "HTTP transport requires the 'http' feature".into(),
        )),
    }
}

async fn run_stdio(handler: BookmarketServer) -> Result<()> {
    let transport = stdio();
    let server = handler
        .serve(transport)
        .await
        .map_err(|e| Error::Transport(format!("Failed to start stdio transport: {e}")))?;

    server
        .waiting()
        .await
        .map_err(|e| Error::Transport(format!("Stdio transport error: {e}")))?;

    Ok(())
}
