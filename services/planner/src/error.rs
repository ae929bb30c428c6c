//! services/planner/src/error.rs
//!
//! Defines the primary error type for the planner service.

use crate::config::ConfigError;
use planner_core::PortError;

/// The primary error type for the `planner` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The password did not match the stored hash.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// A caller supplied a value the operation cannot accept (e.g. an unknown role).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The entity already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A document store or CDN call failed.
    #[error("Remote operation failed: {0}")]
    RemoteOperationFailed(String),

    /// The cached session is missing, stale or could not be verified.
    #[error("Session is no longer valid")]
    SessionInvalid,

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => AppError::NotFound(what),
            PortError::Remote(msg) => AppError::RemoteOperationFailed(msg),
            PortError::Decode(msg) => AppError::RemoteOperationFailed(msg),
        }
    }
}

/// A convenience type alias for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
