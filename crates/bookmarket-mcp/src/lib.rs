//! Authorization-gated MCP server for Bookmarket bookmark management

pub mod auth;
pub mod cache;
pub mod config;
mod error;
pub mod observability;
pub mod server;
pub mod tools;
pub mod transport;

pub use auth::{
    AccessGate, AuthConfig, AuthMode, AuthStack, Claims, KeySetCache, PermissionMapper,
    PolicyClient, Principal, RoleGrant, RoleResolver, TokenVerifier, ToolAuthorizer,
    ToolDescriptor, VerificationError,
};
pub use cache::{
    CacheBackend, CacheConfig, CacheError, CacheKey, CacheNamespace, CacheProvider, CacheResult,
    InMemoryCache, NoopCache, TracedCache, create_cache,
};
pub use config::{Config, ConfigBuilder, TelemetryConfig, TransportConfig, TransportMode};
pub use error::{Error, Result};
pub use server::BookmarketServer;
pub use tools::{CATALOG, ToolExecutor, UnavailableExecutor};
