//! Error types for Horizon Touch core.

use std::fmt;

/// The main error type for core operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Failed to create the I/O runtime.
    RuntimeCreation(String),
    /// The I/O runtime thread exited before handing back its handle.
    RuntimeUnavailable,
    /// The I/O runtime has already been shut down.
    RuntimeShutDown,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuntimeCreation(msg) => write!(f, "Failed to create I/O runtime: {msg}"),
            Self::RuntimeUnavailable => write!(f, "I/O runtime thread exited unexpectedly"),
            Self::RuntimeShutDown => write!(f, "I/O runtime has already been shut down"),
        }
    }
}

impl std::error::Error for CoreError {}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
