//! Stale-while-revalidate cache for the style catalog
//!
//! The snapshot lives in the local key-value store under
//! [`STYLES_CACHE_KEY`]. It is never authoritative: every write goes to the
//! remote store first and then clears the snapshot.
//!
//! Two guards keep background refreshes honest:
//!
//! - `refreshing` collapses concurrent cache-hit reads into one remote fetch.
//! - `generation` is bumped on every invalidation. A refresh that started
//!   before the bump discards its result instead of resurrecting pre-write data.
//!
//! Right after seeding, the remote may still be empty while the seed writes
//! are in flight. `just_seeded` keeps the seeded snapshot through that window;
//! any other empty fetch replaces the snapshot with the empty list.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::join_all;
use remote_store::local::{SEEDED_KEY, STYLES_CACHE_KEY};
use remote_store::{LocalStore, RemoteStore, StyleTemplate, now_millis};
use tracing::{debug, info, warn};

use crate::defaults::default_styles;
use crate::error::{Error, Result};
use crate::reorder::{MoveDirection, apply_move, renumber, sort_by_position};

fn record_read(source: &'static str) {
    metrics::counter!("catalog_reads_total", "source" => source).increment(1);
}

fn record_refresh(result: &'static str) {
    metrics::counter!("catalog_background_refresh_total", "result" => result).increment(1);
}

/// Cache-first view of the remote style catalog.
///
/// Cheap to clone; clones share the snapshot, guards, and stores.
#[derive(Clone)]
pub struct ContentCache {
    remote: Arc<dyn RemoteStore>,
    local: Arc<LocalStore>,
    defaults: Arc<Vec<StyleTemplate>>,
    refreshing: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    just_seeded: Arc<AtomicBool>,
}

impl ContentCache {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<LocalStore>) -> Self {
        Self::with_defaults(remote, local, default_styles())
    }

    /// Use a custom built-in catalog instead of [`default_styles`].
    pub fn with_defaults(
        remote: Arc<dyn RemoteStore>,
        local: Arc<LocalStore>,
        defaults: Vec<StyleTemplate>,
    ) -> Self {
        Self {
            remote,
            local,
            defaults: Arc::new(defaults),
            refreshing: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            just_seeded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current catalog in display order. Never fails.
    ///
    /// With a snapshot present and `force_refresh == false`, returns the
    /// snapshot without touching the remote and refreshes it in the
    /// background for the next read. Otherwise fetches from the remote,
    /// falling back to the snapshot and then to the built-in catalog.
    pub async fn read(&self, force_refresh: bool) -> Vec<StyleTemplate> {
        if !force_refresh {
            if let Some(snapshot) = self.cached().await {
                record_read("cache");
                self.spawn_revalidate();
                return snapshot;
            }
        }
        self.read_through().await
    }

    /// The remote catalog in display order, or the remote error.
    ///
    /// Unlike [`read`](Self::read) this never falls back, so callers that
    /// write back what they read never persist a degraded view.
    pub async fn list_remote(&self) -> Result<Vec<StyleTemplate>> {
        let generation = self.generation.load(Ordering::SeqCst);
        let sorted = sort_by_position(self.remote.list_styles().await?);
        if !sorted.is_empty() {
            self.just_seeded.store(false, Ordering::Release);
        }
        self.store_snapshot(&sorted, generation).await;
        Ok(sorted)
    }

    /// Create a style. Assigns an id and creation time when missing.
    pub async fn create(&self, mut style: StyleTemplate) -> Result<StyleTemplate> {
        validate(&style)?;
        if style.id.trim().is_empty() {
            style.id = uuid::Uuid::new_v4().to_string();
        }
        if style.created_at.is_none() {
            style.created_at = Some(now_millis());
        }

        self.remote.upsert_style(&style).await?;
        self.invalidate().await;
        info!(id = %style.id, name = %style.name, "style created");
        Ok(style)
    }

    /// Replace an existing style by id.
    pub async fn update(&self, style: &StyleTemplate) -> Result<()> {
        if style.id.trim().is_empty() {
            return Err(Error::Invalid("update requires an id".into()));
        }
        validate(style)?;

        self.remote.upsert_style(style).await?;
        self.invalidate().await;
        info!(id = %style.id, "style updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.remote.delete_style(id).await?;
        self.invalidate().await;
        info!(id, "style deleted");
        Ok(())
    }

    /// Import a JSON array of styles, upserting each in parallel.
    ///
    /// Returns how many were written. The snapshot is cleared even when some
    /// writes fail, since others may have landed.
    pub async fn import(&self, json: &str) -> Result<usize> {
        let mut styles: Vec<StyleTemplate> =
            serde_json::from_str(json).map_err(|e| Error::Import(e.to_string()))?;
        if let Some(bad) = styles.iter().find(|s| s.name.trim().is_empty()) {
            return Err(Error::Import(format!("style {:?} has no name", bad.id)));
        }

        let now = now_millis();
        for (offset, style) in styles.iter_mut().enumerate() {
            if style.id.trim().is_empty() {
                style.id = uuid::Uuid::new_v4().to_string();
            }
            if style.created_at.is_none() {
                style.created_at = Some(now + offset as u64);
            }
        }

        let results = join_all(styles.iter().map(|s| self.remote.upsert_style(s))).await;
        self.invalidate().await;
        let written = results.iter().filter(|r| r.is_ok()).count();
        info!(written, total = styles.len(), "styles imported");
        first_error(results)?;
        Ok(written)
    }

    /// Pretty-printed JSON of the current remote catalog.
    pub async fn export(&self) -> Result<String> {
        let styles = self.list_remote().await?;
        serde_json::to_string_pretty(&styles).map_err(|e| Error::Serialize(e.to_string()))
    }

    /// Move one entry of the displayed list up or down.
    ///
    /// `current` should come from [`list_remote`](Self::list_remote): every
    /// entry whose index changes is upserted, so a fallback list would be
    /// written into the remote catalog.
    ///
    /// The whole list is renumbered `0..K-1` in its new order and every entry
    /// whose index changed is written in parallel. Returns the new order.
    pub async fn reorder(
        &self,
        current: &[StyleTemplate],
        index: usize,
        direction: MoveDirection,
    ) -> Result<Vec<StyleTemplate>> {
        let mut list = current.to_vec();
        apply_move(&mut list, index, direction)?;
        let changed = renumber(&mut list);

        let results = join_all(changed.iter().map(|s| self.remote.upsert_style(s))).await;
        self.invalidate().await;
        first_error(results)?;
        info!(index, ?direction, written = changed.len(), "styles reordered");
        Ok(list)
    }

    /// Drop the snapshot so the next read goes to the remote.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.just_seeded.store(false, Ordering::Release);
        if let Err(e) = self.local.remove(STYLES_CACHE_KEY).await {
            warn!(error = %e, "failed to clear catalog snapshot");
        }
    }

    async fn cached(&self) -> Option<Vec<StyleTemplate>> {
        let raw = self.local.get(STYLES_CACHE_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(styles) => Some(styles),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable catalog snapshot");
                None
            }
        }
    }

    /// Store a snapshot unless an invalidation happened since `generation`.
    async fn store_snapshot(&self, styles: &[StyleTemplate], generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding catalog fetched before the last write");
            return false;
        }
        let json = match serde_json::to_string(styles) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize catalog snapshot");
                return false;
            }
        };
        if let Err(e) = self.local.set(STYLES_CACHE_KEY, json).await {
            // The in-memory copy is already updated; only the file write failed.
            warn!(error = %e, "failed to persist catalog snapshot");
        }
        true
    }

    fn spawn_revalidate(&self) {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            debug!("catalog refresh already in flight");
            return;
        }
        let cache = self.clone();
        let generation = self.generation.load(Ordering::SeqCst);

        tokio::spawn(async move {
            match cache.remote.list_styles().await {
                // Seed writes have not landed yet; keep the seeded snapshot.
                Ok(styles) if styles.is_empty() && cache.just_seeded.load(Ordering::Acquire) => {
                    record_refresh("empty")
                }
                Ok(styles) => {
                    if !styles.is_empty() {
                        cache.just_seeded.store(false, Ordering::Release);
                    }
                    let sorted = sort_by_position(styles);
                    if cache.store_snapshot(&sorted, generation).await {
                        debug!(count = sorted.len(), "catalog snapshot refreshed");
                        record_refresh("updated");
                    } else {
                        record_refresh("stale");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "background catalog refresh failed");
                    record_refresh("error");
                }
            }
            cache.refreshing.store(false, Ordering::Release);
        });
    }

    async fn read_through(&self) -> Vec<StyleTemplate> {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.remote.list_styles().await {
            Ok(styles) if styles.is_empty() => self.cold_start(generation).await,
            Ok(styles) => {
                self.just_seeded.store(false, Ordering::Release);
                let sorted = sort_by_position(styles);
                self.store_snapshot(&sorted, generation).await;
                record_read("remote");
                sorted
            }
            Err(e) => {
                warn!(error = %e, "catalog fetch failed, serving fallback");
                if let Some(snapshot) = self.cached().await {
                    record_read("cache_fallback");
                    snapshot
                } else {
                    record_read("defaults");
                    self.defaults.as_ref().clone()
                }
            }
        }
    }

    /// Remote catalog is empty. Seed it once, or report it empty.
    async fn cold_start(&self, generation: u64) -> Vec<StyleTemplate> {
        if self.local.contains(SEEDED_KEY).await {
            if self.just_seeded.load(Ordering::Acquire) {
                if let Some(snapshot) = self.cached().await {
                    debug!("seed writes still in flight, serving seeded snapshot");
                    record_read("cache");
                    return snapshot;
                }
            }
            debug!("remote catalog is empty");
            self.just_seeded.store(false, Ordering::Release);
            self.store_snapshot(&[], generation).await;
            record_read("remote");
            return Vec::new();
        }
        // Marker first: a concurrent first read sees it before our writes land.
        if let Err(e) = self.local.set(SEEDED_KEY, "true".into()).await {
            warn!(error = %e, "failed to persist seeded marker");
        }

        let now = now_millis();
        let seeds: Vec<StyleTemplate> = self
            .defaults
            .iter()
            .enumerate()
            .map(|(offset, style)| {
                let mut style = style.clone();
                style.created_at = Some(now + offset as u64);
                style
            })
            .collect();
        info!(count = seeds.len(), "seeding empty remote catalog with defaults");

        let remote = self.remote.clone();
        let pending = seeds.clone();
        tokio::spawn(async move {
            let results = join_all(pending.iter().map(|s| remote.upsert_style(s))).await;
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                warn!(failed, total = pending.len(), "some default styles were not seeded");
            } else {
                info!(total = pending.len(), "default styles seeded");
            }
        });

        self.just_seeded.store(true, Ordering::Release);
        self.store_snapshot(&seeds, generation).await;
        record_read("defaults");
        seeds
    }
}

fn validate(style: &StyleTemplate) -> Result<()> {
    if style.name.trim().is_empty() {
        return Err(Error::Invalid("name is required".into()));
    }
    if style.prompt.trim().is_empty() {
        return Err(Error::Invalid("prompt is required".into()));
    }
    Ok(())
}

fn first_error(results: Vec<remote_store::Result<()>>) -> Result<()> {
    results.into_iter().collect::<remote_store::Result<Vec<()>>>()?;
    Ok(())
}
