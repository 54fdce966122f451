//! Credential pool and failover dispatch for the image-generation API
//!
//! Credentials live in the settings singleton (`apiKeys`) and are read through
//! `ConfigStore` on every dispatch, so a credential retired by one dispatch is
//! never tried by the next.
//!
//! Dispatch lifecycle:
//! 1. Take the active credentials in stored order (or the fallback if none)
//! 2. Call the generator with one credential at a time, strictly sequentially
//! 3. First success returns immediately
//! 4. Failures are classified; an invalid credential is persisted as `invalid`
//! 5. Every failure moves on to the next credential until the pool runs out

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod pool;

pub use classify::{Classified, classify};
pub use dispatch::{AttemptFailure, FailoverDispatcher, first_success};
pub use error::{Error, Result};
pub use pool::{CredentialPool, FALLBACK_ID};
