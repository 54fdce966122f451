//! Common types for the StyleSwap services

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
