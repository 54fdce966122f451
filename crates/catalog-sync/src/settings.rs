//! Global settings singleton
//!
//! No cache: every read goes to the remote settings row. The stored record
//! is merged over built-in defaults one group at a time, so a record written
//! before a group existed still reads that group's defaults. Within an object
//! group the merge is per field; list groups are taken whole.

use std::sync::Arc;

use remote_store::{RemoteStore, Settings};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub struct ConfigStore {
    remote: Arc<dyn RemoteStore>,
    defaults: Settings,
}

impl ConfigStore {
    pub fn new(remote: Arc<dyn RemoteStore>, defaults: Settings) -> Self {
        Self { remote, defaults }
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Current settings. Never fails; a failed read yields the defaults.
    pub async fn get(&self) -> Settings {
        match self.load().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings read failed, serving defaults");
                self.defaults.clone()
            }
        }
    }

    /// Current settings, surfacing read failures.
    ///
    /// Use this before a read-modify-write so a failed read never overwrites
    /// the stored record with defaults. An absent record is persisted as the
    /// defaults.
    pub async fn load(&self) -> Result<Settings> {
        match self.remote.load_settings().await? {
            Some(record) => Ok(self.merge(record)),
            None => {
                info!("no settings record, persisting defaults");
                if let Err(e) = self.set(&self.defaults).await {
                    warn!(error = %e, "failed to persist default settings");
                }
                Ok(self.defaults.clone())
            }
        }
    }

    /// Write the complete settings object.
    pub async fn set(&self, settings: &Settings) -> Result<()> {
        let record = serde_json::to_value(settings).map_err(|e| Error::Serialize(e.to_string()))?;
        self.remote.save_settings(&record).await?;
        Ok(())
    }

    /// Resolve a raw settings record against the defaults.
    pub fn merge(&self, record: Value) -> Settings {
        let Value::Object(mut record) = record else {
            warn!("settings record is not an object, using defaults");
            return self.defaults.clone();
        };
        let defaults = &self.defaults;
        Settings {
            payment: merge_group("payment", record.remove("payment"), &defaults.payment),
            tracking: merge_group("tracking", record.remove("tracking"), &defaults.tracking),
            coupons: list_group("coupons", record.remove("coupons"), &defaults.coupons),
            api_keys: list_group("apiKeys", record.remove("apiKeys"), &defaults.api_keys),
            extra: record,
        }
    }
}

/// Stored object group merged field by field over its default.
fn merge_group<T>(group: &str, stored: Option<Value>, default: &T) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(stored @ Value::Object(_)) = stored else {
        return default.clone();
    };
    let mut merged = match serde_json::to_value(default) {
        Ok(value) => value,
        Err(_) => return default.clone(),
    };
    deep_merge(&mut merged, stored);
    serde_json::from_value(merged).unwrap_or_else(|e| {
        warn!(group, error = %e, "stored settings group unreadable, using defaults");
        default.clone()
    })
}

/// Stored list group, or the default when absent. Unreadable entries are dropped.
fn list_group<T>(group: &str, stored: Option<Value>, default: &[T]) -> Vec<T>
where
    T: DeserializeOwned + Clone,
{
    let Some(Value::Array(entries)) = stored else {
        return default.to_vec();
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(group, error = %e, "skipping unreadable settings entry");
                None
            }
        })
        .collect()
}

/// Recursively overlay `overlay` onto `base`. Nulls in the overlay are ignored.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        if !value.is_null() {
                            base.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
