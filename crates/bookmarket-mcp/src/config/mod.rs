//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults

mod builder;
mod env;
mod file;

use std::path::Path;

pub use builder::{
    AuthKind, Config, ConfigBuilder, TelemetryConfig, TransportConfig, TransportMode,
};

use crate::Result;

/// Layer the config file and then the environment over `builder`
///
/// `builder` carries the CLI values. Without an explicit `path` the standard
/// locations are searched; a missing file is not an error.
pub fn load_config(builder: ConfigBuilder, path: Option<&Path>) -> Result<ConfigBuilder> {
    let builder = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            file::load_from_file(path, builder)?
        }
        None => match file::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                file::load_from_file(&path, builder)?
            }
            None => builder,
        },
    };

    env::load_from_env(builder)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_env_overrides_file_overrides_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[transport]\nhttp_port = 3000\nmode = \"http\"\n")
            .unwrap();

        env::tests::with_env_vars(&[("MCP_HTTP_PORT", "4000")], || {
            let cli = ConfigBuilder::new()
                .http_port(2000)
                .log_level("debug".to_string());
            let config = load_config(cli, Some(file.path())).unwrap().build().unwrap();

            assert_eq!(config.transport.http_port, 4000);
            assert_eq!(config.transport.mode, TransportMode::Http);
            assert_eq!(config.telemetry.log_level, "debug");
        });
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        env::tests::with_env_vars(&[], || {
            let result = load_config(
                ConfigBuilder::new(),
                Some(Path::new("/nonexistent/bookmarket-mcp.toml")),
            );
            assert!(result.unwrap_err().is_config());
        });
    }
}
