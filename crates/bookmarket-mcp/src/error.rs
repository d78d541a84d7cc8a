use rmcp::ErrorData;
use thiserror::Error;

use crate::auth::VerificationError;
use crate::cache::CacheError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] VerificationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<Error> for ErrorData {
    fn from(err: Error) -> Self {
        match err {
            // Token detail stays in the server log
            Error::Auth(_) => Self::invalid_request("Invalid token", None),
            Error::Config(msg) => Self::internal_error(format!("Configuration error: {msg}"), None),
            Error::Transport(msg) => Self::internal_error(format!("Transport error: {msg}"), None),
            Error::Cache(e) => Self::internal_error(format!("Cache error: {e}"), None),
            Error::Io(e) => Self::internal_error(format!("I/O error: {e}"), None),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
