use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bookmarket_mcp::config::{self, ConfigBuilder, TransportMode};
use bookmarket_mcp::observability::{init_observability, shutdown_observability};
use bookmarket_mcp::transport::run_transport;
use bookmarket_mcp::{AuthStack, BookmarketServer, UnavailableExecutor, create_cache};
use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "bookmarket-mcp")]
#[command(about = "Authorization-gated MCP server for Bookmarket", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport mode (stdio or http)
    #[arg(long)]
    transport: Option<TransportMode>,

    /// HTTP bind host (when transport=http)
    #[arg(long)]
    http_host: Option<IpAddr>,

    /// HTTP bind port (when transport=http)
    #[arg(long)]
    http_port: Option<u16>,

    /// Public URL of this server, advertised in OAuth discovery documents
    #[arg(long)]
    resource_url: Option<Url>,

    /// OAuth authorization server; enables JWT authentication
    #[arg(long)]
    issuer: Option<Url>,

    /// Accepted token audience (repeatable)
    #[arg(long)]
    audience: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Only values given explicitly on the command line are applied
    fn into_builder(self) -> ConfigBuilder {
        let mut builder = ConfigBuilder::new();

        if let Some(mode) = self.transport {
            builder = builder.transport_mode(mode);
        }
        if let Some(host) = self.http_host {
            builder = builder.http_host(host);
        }
        if let Some(port) = self.http_port {
            builder = builder.http_port(port);
        }
        if let Some(url) = self.resource_url {
            builder = builder.resource_url(url);
        }
        if let Some(issuer) = self.issuer {
            builder = builder.issuer(issuer);
        }
        if !self.audience.is_empty() {
            builder = builder.audience(self.audience);
        }
        if self.verbose {
            builder = builder.log_level("debug".to_string());
        }
        if self.json_logs {
            builder = builder.json_logs(true);
        }

        builder
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone();

    // Load configuration with precedence: env > file > CLI > defaults
    let builder = config::load_config(args.into_builder(), config_path.as_deref())?;
    let config = builder.build()?;

    // Initialize observability
    init_observability(&config.telemetry)?;

    let cache = create_cache(&config.cache);
    tracing::info!(
        "Cache enabled: {}, backend: {:?}",
        config.cache.enabled,
        config.cache.backend
    );

    let stack = AuthStack::build(config.auth.clone(), cache)?;
    let handler = BookmarketServer::new(stack.authorizer.clone(), Arc::new(UnavailableExecutor));

    tracing::info!("Starting Bookmarket MCP server");
    tracing::info!("Transport: {:?}", config.transport.mode);
    tracing::info!("Resource URL: {}", config.resource_url);
    tracing::info!("Authentication enabled: {}", stack.is_enabled());

    // Setup shutdown signal
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    // Run transport
    let result = run_transport(handler, &stack, &config, shutdown).await;

    // Shutdown observability
    shutdown_observability();

    result.map_err(Into::into)
}
