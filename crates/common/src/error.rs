//! Startup errors: config file reading, parsing, and validation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A value that parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
