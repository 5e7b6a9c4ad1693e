//! Registry error types.

use thiserror::Error;

/// Form registry operation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing required field, or a referenced definition file that does
    /// not exist. Surfaced before any side effect is performed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation on insert.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<satchel_core::Error> for RegistryError {
    fn from(err: satchel_core::Error) -> Self {
        match err {
            satchel_core::Error::Io(io) => Self::Io(io),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
