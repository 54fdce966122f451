//! Cache-first synchronization for the style catalog and global settings
//!
//! `ContentCache` serves the catalog from a local snapshot and keeps it
//! eventually consistent with the remote store:
//!
//! 1. Cache hit → return the snapshot immediately, revalidate in the background
//! 2. Cache miss or forced refresh → fetch remote, store snapshot, return
//! 3. Remote empty on first run → seed built-in defaults in parallel
//! 4. Any write → go straight to the remote store, then clear the snapshot
//!
//! `ConfigStore` has no cache at all: every read goes to the remote settings
//! row and is deep-merged over built-in defaults group by group.

pub mod catalog;
pub mod defaults;
pub mod error;
pub mod reorder;
pub mod settings;

pub use catalog::ContentCache;
pub use defaults::default_styles;
pub use error::{Error, Result};
pub use reorder::{MoveDirection, sort_by_position};
pub use settings::ConfigStore;
