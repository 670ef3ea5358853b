//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("invalid owner: {0}")]
    InvalidOwner(String),

    #[error("invalid visibility: {0}")]
    InvalidVisibility(String),

    #[error("invalid part sequence: {0}")]
    InvalidPartSequence(String),

    #[error("invalid sync scope: {0}")]
    InvalidScope(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
