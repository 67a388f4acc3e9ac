//! Server error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server. Tool failures are not among them: they are
/// returned to the caller as flagged tool results.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error on stdin/stdout or a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding).
    #[error("Protocol error: {0}")]
    Protocol(#[from] secretary_protocol::ProtocolError),

    /// A configuration file could not be read or parsed.
    #[error("failed to read config {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The calendar client could not be built.
    #[error("Provider error: {0}")]
    Provider(#[from] secretary_providers::ProviderError),

    /// A tool group was requested that no provider backs.
    #[error("tool group '{group}' requested but no {group} provider is configured")]
    MissingProvider { group: String },

    /// Logging could not be set up.
    #[error("Tracing error: {0}")]
    Tracing(#[from] secretary_core::TracingError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_file(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_provider(group: impl Into<String>) -> Self {
        Self::MissingProvider {
            group: group.into(),
        }
    }
}
