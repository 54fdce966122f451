//! Error types for catalog and settings writes
//!
//! Reads never return these: they degrade to cached or default data.

/// Errors from write-path operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote store error: {0}")]
    Remote(#[from] remote_store::Error),

    #[error("invalid import: {0}")]
    Import(String),

    #[error("invalid reorder: {0}")]
    Reorder(String),

    #[error("invalid style: {0}")]
    Invalid(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Result alias for catalog and settings operations.
pub type Result<T> = std::result::Result<T, Error>;
