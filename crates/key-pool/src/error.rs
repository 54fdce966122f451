//! Error types for pool and dispatch operations

use crate::dispatch::AttemptFailure;

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty pool and no fallback credential. No call was made.
    #[error("no generation credentials configured")]
    NoCredentials,

    #[error("all {attempted} credentials failed")]
    PoolExhausted {
        attempted: usize,
        failures: Vec<AttemptFailure>,
    },

    #[error("credential not found: {0}")]
    NotFound(String),

    #[error("invalid credential: {0}")]
    Invalid(String),

    #[error("settings error: {0}")]
    Settings(#[from] catalog_sync::Error),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
