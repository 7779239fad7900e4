//! Error types for touch input.
//!
//! Only configuration and setup fail with an error. Protocol noise such as
//! malformed packets, duplicate session ids or late frames is logged and
//! dropped, never surfaced here.

use std::path::PathBuf;

use horizon_touch_core::CoreError;
use horizon_touch_net::NetworkError;

/// Result type alias for touch operations.
pub type Result<T> = std::result::Result<T, TouchError>;

/// Errors that can occur while configuring or starting touch input.
#[derive(Debug, thiserror::Error)]
pub enum TouchError {
    /// The requested TUIO protocol version is not supported.
    #[error("Unsupported TUIO version '{0}'")]
    UnsupportedVersion(String),

    /// The configured IP address could not be parsed.
    #[error("Invalid IP address '{0}'")]
    InvalidAddress(String),

    /// The configured port cannot be used.
    #[error("Invalid port {0}")]
    InvalidPort(u16),

    /// A configuration document could not be parsed or serialized.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration file could not be read or written.
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transport could not be set up.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The I/O runtime could not be used.
    #[error("Runtime error: {0}")]
    Runtime(#[from] CoreError),
}

impl TouchError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
