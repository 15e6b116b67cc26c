//! Error types for Gatehouse.

use thiserror::Error;

use crate::auth::{PermissionError, ServiceAccountError, StoreError};

/// Common error type for Gatehouse.
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential store error.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// Service account error.
    #[error("service account error: {0}")]
    ServiceAccount(#[from] ServiceAccountError),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(#[from] PermissionError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for Gatehouse operations.
pub type Result<T> = std::result::Result<T, GatehouseError>;
