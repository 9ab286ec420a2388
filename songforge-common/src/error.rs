//! Common error types for SongForge

use thiserror::Error;

/// Common result type for SongForge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared below the domain layer
///
/// The generation service defines its own domain error taxonomy
/// (`songforge_gen::GenError`) and wraps this type for configuration
/// and I/O faults.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
