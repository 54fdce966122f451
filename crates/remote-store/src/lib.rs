//! Persistence for the StyleSwap catalog and settings
//!
//! Two kinds of storage live here:
//!
//! - **Remote store** (`RemoteStore` trait): the authoritative copy of the
//!   style-template catalog and the global settings singleton. `RestStore`
//!   talks to a PostgREST endpoint; `MemoryStore` keeps everything in process
//!   for local development and tests.
//! - **Local store** (`LocalStore`): a small persistent key-value file used for
//!   the catalog cache snapshot and the "catalog seeded" marker. Never
//!   authoritative.
//!
//! The data model (`Credential`, `StyleTemplate`, `Settings`) is shared by
//! every crate above this one.

pub mod error;
pub mod local;
pub mod memory;
pub mod model;
pub mod rest;

pub use error::{Error, Result};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use model::{
    Coupon, Credential, CredentialStatus, PaymentConfig, Settings, StyleTemplate, TrackingConfig,
    now_millis,
};
pub use rest::RestStore;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `RemoteStore` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Authoritative remote storage for catalog entities and the settings row.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn RemoteStore>`). Single-row operations are atomic on the remote
/// side; nothing here provides cross-call transactions.
pub trait RemoteStore: Send + Sync {
    /// All catalog entities in insertion (creation) order.
    fn list_styles(&self) -> BoxFuture<'_, Result<Vec<StyleTemplate>>>;

    /// Insert or replace one entity by id.
    fn upsert_style<'a>(&'a self, style: &'a StyleTemplate) -> BoxFuture<'a, Result<()>>;

    /// Delete one entity by id. Deleting a missing id is not an error.
    fn delete_style<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Raw settings blob, `None` when the row has never been written.
    fn load_settings(&self) -> BoxFuture<'_, Result<Option<serde_json::Value>>>;

    /// Replace the settings blob in full.
    fn save_settings<'a>(&'a self, config: &'a serde_json::Value) -> BoxFuture<'a, Result<()>>;
}
