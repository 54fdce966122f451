//! Credential pool backed by the settings singleton
//!
//! The pool has no state of its own. Every read goes through `ConfigStore`,
//! and every mutation is a read-modify-write of the whole settings record
//! using the strict `load()`, so a failed read never writes defaults back over
//! the stored pool.
//!
//! Status transitions:
//! - Active → Invalid (dispatcher, on an auth/revocation failure)
//! - Invalid/Exhausted → Active (admin reset only)

use std::sync::Arc;

use catalog_sync::ConfigStore;
use common::Secret;
use remote_store::{Credential, CredentialStatus, now_millis};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Id of the process-level fallback credential. It is never persisted.
pub const FALLBACK_ID: &str = "fallback";

pub struct CredentialPool {
    settings: Arc<ConfigStore>,
    fallback: Option<Credential>,
}

impl CredentialPool {
    /// `fallback` is used only when the stored pool has no active credential.
    pub fn new(settings: Arc<ConfigStore>, fallback: Option<Secret<String>>) -> Self {
        let fallback = fallback.filter(|s| !s.is_blank()).map(|secret| Credential {
            id: FALLBACK_ID.to_string(),
            secret,
            label: FALLBACK_ID.to_string(),
            status: CredentialStatus::Active,
            added_at: 0,
        });
        Self { settings, fallback }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Active credentials in stored order, or the fallback when there are none.
    pub async fn active(&self) -> Vec<Credential> {
        let mut active: Vec<Credential> = self
            .settings
            .get()
            .await
            .api_keys
            .into_iter()
            .filter(Credential::is_active)
            .collect();
        if active.is_empty() {
            if let Some(fallback) = &self.fallback {
                active.push(fallback.clone());
            }
        }
        active
    }

    /// Persist `invalid` for a credential. Returns whether anything changed.
    ///
    /// The fallback credential is never persisted, so it is never retired.
    pub async fn mark_invalid(&self, id: &str) -> Result<bool> {
        if id == FALLBACK_ID {
            warn!("fallback credential rejected, leaving it in place");
            return Ok(false);
        }
        let mut settings = self.settings.load().await?;
        let credential = find_mut(&mut settings.api_keys, id)?;
        if credential.status == CredentialStatus::Invalid {
            return Ok(false);
        }
        credential.status = CredentialStatus::Invalid;
        let label = credential.display_label();
        self.settings.set(&settings).await?;
        warn!(credential = %label, "credential marked invalid");
        Ok(true)
    }

    /// Append a credential to the end of the pool.
    pub async fn add(&self, label: &str, secret: Secret<String>) -> Result<Credential> {
        if secret.is_blank() {
            return Err(Error::Invalid("secret must not be empty".into()));
        }
        let mut settings = self.settings.load().await?;
        if settings
            .api_keys
            .iter()
            .any(|c| c.secret.expose() == secret.expose())
        {
            return Err(Error::Invalid(format!(
                "{} is already in the pool",
                secret.masked()
            )));
        }

        let credential = Credential {
            id: uuid::Uuid::new_v4().to_string(),
            secret,
            label: label.trim().to_string(),
            status: CredentialStatus::Active,
            added_at: now_millis(),
        };
        settings.api_keys.push(credential.clone());
        self.settings.set(&settings).await?;
        info!(credential = %credential.display_label(), "credential added to pool");
        Ok(credential)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut settings = self.settings.load().await?;
        let before = settings.api_keys.len();
        settings.api_keys.retain(|c| c.id != id);
        if settings.api_keys.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        self.settings.set(&settings).await?;
        info!(id, "credential removed from pool");
        Ok(())
    }

    /// Admin transition back to `active`.
    pub async fn reset(&self, id: &str) -> Result<Credential> {
        let mut settings = self.settings.load().await?;
        let credential = find_mut(&mut settings.api_keys, id)?;
        credential.status = CredentialStatus::Active;
        let credential = credential.clone();
        self.settings.set(&settings).await?;
        info!(credential = %credential.display_label(), "credential reset to active");
        Ok(credential)
    }

    /// Every stored credential, any status, in stored order.
    pub async fn list(&self) -> Result<Vec<Credential>> {
        Ok(self.settings.load().await?.api_keys)
    }

    /// Pool health summary for the admin endpoint. Secrets appear masked.
    ///
    /// All active → healthy, some active → degraded, none → unhealthy. A
    /// fallback keeps an empty pool degraded rather than unhealthy.
    pub async fn health(&self) -> serde_json::Value {
        let credentials = self.settings.get().await.api_keys;
        let count = |status: CredentialStatus| credentials.iter().filter(|c| c.status == status).count();
        let total = credentials.len();
        let active = count(CredentialStatus::Active);

        let status = if total > 0 && active == total {
            "healthy"
        } else if active > 0 || self.fallback.is_some() {
            "degraded"
        } else {
            "unhealthy"
        };

        let entries: Vec<serde_json::Value> = credentials
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "label": c.label,
                    "key": c.secret.masked(),
                    "status": c.status.label(),
                    "added_at": c.added_at,
                })
            })
            .collect();

        serde_json::json!({
            "status": status,
            "credentials_total": total,
            "credentials_active": active,
            "credentials_invalid": count(CredentialStatus::Invalid),
            "credentials_exhausted": count(CredentialStatus::Exhausted),
            "fallback_configured": self.fallback.is_some(),
            "credentials": entries,
        })
    }
}

fn find_mut<'a>(credentials: &'a mut [Credential], id: &str) -> Result<&'a mut Credential> {
    credentials
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::NotFound(id.to_string()))
}
