//! In-process remote store
//!
//! Behaves like the PostgREST backend (insertion-ordered listing, upsert by
//! id, idempotent delete) without a network. Used by the `memory` backend for
//! local development, and by tests, which also rely on its call counters,
//! failure injection, and read gate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{RwLock, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::StyleTemplate;
use crate::{BoxFuture, RemoteStore};

pub struct MemoryStore {
    styles: RwLock<Vec<StyleTemplate>>,
    settings: RwLock<Option<serde_json::Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    style_reads: AtomicUsize,
    style_writes: AtomicUsize,
    settings_writes: AtomicUsize,
    /// `false` holds every `list_styles` call until reopened.
    read_gate: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), None)
    }

    pub fn with_styles(styles: Vec<StyleTemplate>) -> Self {
        Self::from_parts(styles, None)
    }

    pub fn with_settings(config: serde_json::Value) -> Self {
        Self::from_parts(Vec::new(), Some(config))
    }

    fn from_parts(styles: Vec<StyleTemplate>, settings: Option<serde_json::Value>) -> Self {
        Self {
            styles: RwLock::new(styles),
            settings: RwLock::new(settings),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            style_reads: AtomicUsize::new(0),
            style_writes: AtomicUsize::new(0),
            settings_writes: AtomicUsize::new(0),
            read_gate: watch::Sender::new(true),
        }
    }

    /// Make every read fail with `Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with `Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold (`false`) or release (`true`) catalog reads.
    pub fn set_reads_open(&self, open: bool) {
        self.read_gate.send_replace(open);
    }

    /// Number of `list_styles` calls started so far.
    pub fn style_reads(&self) -> usize {
        self.style_reads.load(Ordering::SeqCst)
    }

    /// Number of successful style upserts and deletes.
    pub fn style_writes(&self) -> usize {
        self.style_writes.load(Ordering::SeqCst)
    }

    pub fn settings_writes(&self) -> usize {
        self.settings_writes.load(Ordering::SeqCst)
    }

    pub async fn styles(&self) -> Vec<StyleTemplate> {
        self.styles.read().await.clone()
    }

    pub async fn settings(&self) -> Option<serde_json::Value> {
        self.settings.read().await.clone()
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("injected read failure".into()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn list_styles(&self) -> BoxFuture<'_, Result<Vec<StyleTemplate>>> {
        Box::pin(async move {
            self.style_reads.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.read_gate.subscribe();
            // Sender lives in self, so the channel cannot close here.
            let _ = gate.wait_for(|open| *open).await;
            self.check_reads()?;
            Ok(self.styles.read().await.clone())
        })
    }

    fn upsert_style<'a>(&'a self, style: &'a StyleTemplate) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.check_writes()?;
            let mut styles = self.styles.write().await;
            match styles.iter_mut().find(|s| s.id == style.id) {
                Some(existing) => *existing = style.clone(),
                None => styles.push(style.clone()),
            }
            self.style_writes.fetch_add(1, Ordering::SeqCst);
            debug!(id = %style.id, "memory store upserted style");
            Ok(())
        })
    }

    fn delete_style<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.check_writes()?;
            self.styles.write().await.retain(|s| s.id != id);
            self.style_writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn load_settings(&self) -> BoxFuture<'_, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            self.check_reads()?;
            Ok(self.settings.read().await.clone())
        })
    }

    fn save_settings<'a>(&'a self, config: &'a serde_json::Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.check_writes()?;
            *self.settings.write().await = Some(config.clone());
            self.settings_writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(id: &str) -> StyleTemplate {
        StyleTemplate {
            id: id.into(),
            name: format!("Style {id}"),
            prompt: "p".into(),
            description: String::new(),
            image_url: String::new(),
            position_index: None,
            auto_apply: false,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_in_place_and_keeps_order() {
        let store = MemoryStore::with_styles(vec![style("a"), style("b")]);
        let mut updated = style("a");
        updated.name = "Renamed".into();
        store.upsert_style(&updated).await.unwrap();
        store.upsert_style(&style("c")).await.unwrap();

        let listed = store.list_styles().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(listed[0].name, "Renamed");
        assert_eq!(store.style_writes(), 2);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_unavailable() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        store.set_fail_writes(true);

        assert!(matches!(store.list_styles().await, Err(Error::Unavailable(_))));
        assert!(matches!(store.load_settings().await, Err(Error::Unavailable(_))));
        assert!(store.upsert_style(&style("a")).await.is_err());
        assert!(store.save_settings(&serde_json::json!({})).await.is_err());
        assert_eq!(store.style_writes(), 0);
    }

    #[tokio::test]
    async fn closed_gate_holds_reads_until_reopened() {
        let store = std::sync::Arc::new(MemoryStore::with_styles(vec![style("a")]));
        store.set_reads_open(false);

        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.list_styles().await })
        };
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());
        assert_eq!(store.style_reads(), 1);

        store.set_reads_open(true);
        let listed = reader.await.unwrap().unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_id_is_ok() {
        let store = MemoryStore::with_styles(vec![style("a")]);
        store.delete_style("zzz").await.unwrap();
        assert_eq!(store.styles().await.len(), 1);
    }
}
