//! PostgREST-backed remote store (Supabase-compatible)
//!
//! Tables:
//! - `styles`: one row per catalog entity, ordered by `created_at`
//! - `settings`: single row `id = 'global'` holding the whole settings object
//!   in a `config` JSON column
//!
//! Upserts use `Prefer: resolution=merge-duplicates` so writing an existing id
//! replaces the row instead of failing.

use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::StyleTemplate;
use crate::{BoxFuture, RemoteStore};

const STYLES_TABLE: &str = "styles";
const SETTINGS_TABLE: &str = "settings";
const SETTINGS_ROW_ID: &str = "global";
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Serialize)]
struct SettingsRowOut<'a> {
    id: &'a str,
    config: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct SettingsRowIn {
    config: serde_json::Value,
}

/// HTTP client for a PostgREST endpoint.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    timeout: Duration,
}

impl RestStore {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let key = self.api_key.expose();
        self.client
            .request(method, self.table_url(table))
            .header("apikey", key.as_str())
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .timeout(self.timeout)
    }

    /// Send a request and turn transport or non-2xx outcomes into errors.
    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Http(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(status = status.as_u16(), what, "remote store rejected request");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn fetch_styles(&self) -> Result<Vec<StyleTemplate>> {
        let builder = self
            .request(reqwest::Method::GET, STYLES_TABLE)
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        let response = self.send(builder, "listing styles").await?;
        let styles: Vec<StyleTemplate> = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("styles response: {e}")))?;
        debug!(count = styles.len(), "fetched styles");
        Ok(styles)
    }

    async fn put_style(&self, style: &StyleTemplate) -> Result<()> {
        let builder = self
            .request(reqwest::Method::POST, STYLES_TABLE)
            .header("Prefer", UPSERT_PREFER)
            .json(style);
        self.send(builder, "upserting style").await?;
        Ok(())
    }

    async fn remove_style(&self, id: &str) -> Result<()> {
        let filter = format!("eq.{id}");
        let builder = self
            .request(reqwest::Method::DELETE, STYLES_TABLE)
            .query(&[("id", filter.as_str())]);
        self.send(builder, "deleting style").await?;
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Option<serde_json::Value>> {
        let filter = format!("eq.{SETTINGS_ROW_ID}");
        let builder = self
            .request(reqwest::Method::GET, SETTINGS_TABLE)
            .query(&[("select", "config"), ("id", filter.as_str())]);
        let response = self.send(builder, "loading settings").await?;
        let rows: Vec<SettingsRowIn> = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("settings response: {e}")))?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.config)
            .filter(|config| !config.is_null()))
    }

    async fn put_settings(&self, config: &serde_json::Value) -> Result<()> {
        let builder = self
            .request(reqwest::Method::POST, SETTINGS_TABLE)
            .header("Prefer", UPSERT_PREFER)
            .json(&SettingsRowOut {
                id: SETTINGS_ROW_ID,
                config,
            });
        self.send(builder, "saving settings").await?;
        Ok(())
    }
}

impl RemoteStore for RestStore {
    fn list_styles(&self) -> BoxFuture<'_, Result<Vec<StyleTemplate>>> {
        Box::pin(self.fetch_styles())
    }

    fn upsert_style<'a>(&'a self, style: &'a StyleTemplate) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.put_style(style))
    }

    fn delete_style<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.remove_style(id))
    }

    fn load_settings(&self) -> BoxFuture<'_, Result<Option<serde_json::Value>>> {
        Box::pin(self.fetch_settings())
    }

    fn save_settings<'a>(&'a self, config: &'a serde_json::Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.put_settings(config))
    }
}
