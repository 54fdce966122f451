//! Local persistent key-value store
//!
//! Holds small string values that must survive a restart but are never
//! authoritative: the serialized catalog cache snapshot and the "catalog
//! seeded" marker. Backed by a JSON file written atomically (temp file +
//! rename); `in_memory()` skips the file entirely.
//!
//! Reads only clone from the in-memory map, so a cache-hit read never waits
//! on disk I/O. Writers serialize on a separate lock and release the map
//! before touching the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Key holding the serialized catalog snapshot.
pub const STYLES_CACHE_KEY: &str = "styleswap_styles_cache_v1";

/// Key marking that default entities have been pushed to an empty remote catalog.
pub const SEEDED_KEY: &str = "styleswap_db_initialized";

/// Thread-safe local key-value file.
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Mutex<HashMap<String, String>>,
    /// Held across a whole write so files land in mutation order.
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading local state file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Decode(format!("parsing local state file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded local state");
            entries
        } else {
            info!(path = %path.display(), "local state file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            write_lock: Mutex::new(()),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.lock().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.contains_key(key)
    }

    /// Set a value and persist.
    pub async fn set(&self, key: &str, value: String) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let snapshot = {
            let mut state = self.state.lock().await;
            state.insert(key.to_string(), value);
            state.clone()
        };
        debug!(key, "local value set");
        self.persist(&snapshot).await
    }

    /// Remove a value and persist. Returns whether the key existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let _write = self.write_lock.lock().await;
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.remove(key).is_none() {
                return Ok(false);
            }
            state.clone()
        };
        debug!(key, "local value removed");
        self.persist(&snapshot).await?;
        Ok(true)
    }

    async fn persist(&self, state: &HashMap<String, String>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write the map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target so a crash mid-write never leaves a truncated file.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Decode(format!("serializing local state: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("local state path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".local-state.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp local state file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting local state permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp local state file: {e}")))?;

    debug!(path = %path.display(), "persisted local state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = LocalStore::load(path.clone()).await.unwrap();
        store.set(SEEDED_KEY, "true".into()).await.unwrap();

        let reloaded = LocalStore::load(path).await.unwrap();
        assert_eq!(reloaded.get(SEEDED_KEY).await.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        assert!(!path.exists());
        let store = LocalStore::load(path.clone()).await.unwrap();
        assert!(!store.contains(STYLES_CACHE_KEY).await);
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn remove_reports_whether_key_existed() {
        let store = LocalStore::in_memory();
        store.set(STYLES_CACHE_KEY, "[]".into()).await.unwrap();

        assert!(store.remove(STYLES_CACHE_KEY).await.unwrap());
        assert!(!store.remove(STYLES_CACHE_KEY).await.unwrap());
        assert!(store.get(STYLES_CACHE_KEY).await.is_none());
    }

    #[tokio::test]
    async fn reads_do_not_wait_for_an_in_progress_write() {
        let store = LocalStore::in_memory();
        store.set(STYLES_CACHE_KEY, "[]".into()).await.unwrap();

        // Stand in for a writer that is still persisting.
        let _writing = store.write_lock.lock().await;
        let read = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.get(STYLES_CACHE_KEY),
        )
        .await;
        assert_eq!(read.unwrap().as_deref(), Some("[]"));
        assert!(store.contains(STYLES_CACHE_KEY).await);
    }

    #[tokio::test]
    async fn concurrent_writes_persist_the_final_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = std::sync::Arc::new(LocalStore::load(path.clone()).await.unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.set(&format!("k{i}"), i.to_string()).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let reloaded = LocalStore::load(path).await.unwrap();
        for i in 0..8 {
            assert_eq!(reloaded.get(&format!("k{i}")).await, Some(i.to_string()));
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let result = LocalStore::load(path).await;
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = LocalStore::load(path.clone()).await.unwrap();
        store.set("k", "v".into()).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "local state file must be 0600, got {mode:o}");
    }
}
