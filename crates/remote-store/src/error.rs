//! Error types for remote and local storage

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote request failed: {0}")]
    Http(String),

    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
