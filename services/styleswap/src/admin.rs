//! Admin API for catalog, settings, and credential management
//!
//! Runs on a separate listener and is never exposed next to the public API.
//! Secrets leave this API masked: settings and key listings show only the
//! last four characters of each secret.
//!
//! Endpoints:
//! - GET    /admin/styles             fresh catalog from the remote
//! - POST   /admin/styles             create a style
//! - PUT    /admin/styles/{id}        replace a style
//! - DELETE /admin/styles/{id}        delete a style
//! - POST   /admin/styles/reorder     move one entry up or down
//! - POST   /admin/styles/import      upsert a JSON array of styles
//! - GET    /admin/styles/export      catalog as a JSON download
//! - GET    /admin/settings           settings with secrets masked
//! - PUT    /admin/settings           merge a partial settings object
//! - GET    /admin/keys               credential pool
//! - POST   /admin/keys               add a credential
//! - DELETE /admin/keys/{id}          remove a credential
//! - POST   /admin/keys/{id}/reset    mark a credential active again
//! - GET    /admin/pool               pool health summary

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use catalog_sync::settings::deep_merge;
use catalog_sync::{ConfigStore, ContentCache, MoveDirection};
use common::Secret;
use key_pool::CredentialPool;
use remote_store::{Credential, Settings, StyleTemplate};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    cache: ContentCache,
    settings: Arc<ConfigStore>,
    pool: Arc<CredentialPool>,
}

impl AdminState {
    pub fn new(cache: ContentCache, settings: Arc<ConfigStore>, pool: Arc<CredentialPool>) -> Self {
        Self {
            cache,
            settings,
            pool,
        }
    }
}

/// Build the admin router.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/styles", get(list_styles).post(create_style))
        .route("/admin/styles/reorder", post(reorder_styles))
        .route("/admin/styles/import", post(import_styles))
        .route("/admin/styles/export", get(export_styles))
        .route("/admin/styles/{id}", put(update_style).delete(delete_style))
        .route("/admin/settings", get(get_settings).put(put_settings))
        .route("/admin/keys", get(list_keys).post(add_key))
        .route("/admin/keys/{id}", delete(remove_key))
        .route("/admin/keys/{id}/reset", post(reset_key))
        .route("/admin/pool", get(pool_status))
        .with_state(state)
}

/// Credential as shown to the admin: the secret is masked.
fn credential_json(credential: &Credential) -> Value {
    serde_json::json!({
        "id": credential.id,
        "label": credential.label,
        "key": credential.secret.masked(),
        "status": credential.status.label(),
        "added_at": credential.added_at,
    })
}

/// Settings with every secret replaced by its masked form.
fn masked_settings(settings: &Settings) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(settings)
        .map_err(|e| catalog_sync::Error::Serialize(e.to_string()))?;
    value["payment"]["keySecret"] = Value::String(settings.payment.key_secret.masked());
    value["paymentCurrencySymbol"] = Value::String(settings.payment.currency_symbol().into());
    value["apiKeys"] = settings.api_keys.iter().map(credential_json).collect();
    Ok(value)
}

async fn list_styles(State(state): State<AdminState>) -> impl IntoResponse {
    Json(state.cache.read(true).await)
}

async fn create_style(
    State(state): State<AdminState>,
    body: Result<Json<StyleTemplate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(style) = body?;
    let created = state.cache.create(style).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The path id wins over any id in the body.
async fn update_style(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    body: Result<Json<StyleTemplate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut style) = body?;
    style.id = id;
    state.cache.update(&style).await?;
    Ok(Json(style))
}

async fn delete_style(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.cache.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    index: usize,
    direction: MoveDirection,
}

/// Moves within the fresh remote catalog. An unreachable remote is a 502,
/// never a reorder of the fallback list.
async fn reorder_styles(
    State(state): State<AdminState>,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let current = state.cache.list_remote().await?;
    let reordered = state
        .cache
        .reorder(&current, request.index, request.direction)
        .await?;
    Ok(Json(reordered))
}

async fn import_styles(
    State(state): State<AdminState>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let imported = state.cache.import(&body).await?;
    Ok(Json(serde_json::json!({ "imported": imported })))
}

async fn export_styles(State(state): State<AdminState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.cache.export().await?;
    Ok((
        StatusCode::OK,
        [
            (axum::http::header::CONTENT_TYPE, "application/json"),
            (
                axum::http::header::CONTENT_DISPOSITION,
                "attachment; filename=\"styleswap-styles.json\"",
            ),
        ],
        body,
    ))
}

async fn get_settings(State(state): State<AdminState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings.get().await;
    Ok(Json(masked_settings(&settings)?))
}

/// Merge a partial settings object over the stored record.
///
/// `apiKeys` is ignored here; the pool is managed through `/admin/keys`. A
/// masked payment secret (as returned by GET) leaves the stored one in place.
async fn put_settings(
    State(state): State<AdminState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut patch) = body?;
    let Some(fields) = patch.as_object_mut() else {
        return Err(ApiError::bad_request("settings must be a JSON object"));
    };
    fields.remove("apiKeys");
    fields.remove("paymentCurrencySymbol");
    if let Some(payment) = fields.get_mut("payment").and_then(Value::as_object_mut) {
        let masked = payment
            .get("keySecret")
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with('…'));
        if masked {
            payment.remove("keySecret");
        }
    }

    let current = state.settings.load().await?;
    let mut record = serde_json::to_value(&current)
        .map_err(|e| catalog_sync::Error::Serialize(e.to_string()))?;
    deep_merge(&mut record, patch);
    let merged = state.settings.merge(record);
    state.settings.set(&merged).await?;
    info!("settings updated");

    Ok(Json(masked_settings(&merged)?))
}

async fn list_keys(State(state): State<AdminState>) -> Result<impl IntoResponse, ApiError> {
    let credentials = state.pool.list().await?;
    let keys: Vec<Value> = credentials.iter().map(credential_json).collect();
    Ok(Json(serde_json::json!({ "keys": keys })))
}

#[derive(Deserialize)]
struct AddKeyRequest {
    #[serde(default)]
    label: String,
    key: Secret<String>,
}

async fn add_key(
    State(state): State<AdminState>,
    body: Result<Json<AddKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let credential = state.pool.add(&request.label, request.key).await?;
    Ok((StatusCode::CREATED, Json(credential_json(&credential))))
}

async fn remove_key(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.pool.remove(&id).await?;
    Ok(Json(serde_json::json!({ "removed": id })))
}

async fn reset_key(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let credential = state.pool.reset(&id).await?;
    Ok(Json(credential_json(&credential)))
}

async fn pool_status(State(state): State<AdminState>) -> impl IntoResponse {
    Json(state.pool.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use remote_store::{LocalStore, MemoryStore, RemoteStore};
    use serde_json::json;
    use tower::ServiceExt;

    async fn test_admin(
        styles: Vec<StyleTemplate>,
        settings: Value,
    ) -> (Arc<MemoryStore>, Router) {
        let remote = Arc::new(MemoryStore::with_styles(styles));
        remote.save_settings(&settings).await.unwrap();
        let config = Arc::new(ConfigStore::new(remote.clone(), Settings::default()));
        let pool = Arc::new(CredentialPool::new(config.clone(), None));
        let cache = ContentCache::new(remote.clone(), Arc::new(LocalStore::in_memory()));
        let router = build_admin_router(AdminState::new(cache, config, pool));
        (remote, router)
    }

    fn style(id: &str, position: i64) -> StyleTemplate {
        StyleTemplate {
            id: id.into(),
            name: format!("Style {id}"),
            prompt: format!("prompt {id}"),
            description: String::new(),
            image_url: String::new(),
            position_index: Some(position),
            auto_apply: false,
            created_at: Some(position as u64 + 1),
        }
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn ids(list: &Value) -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn style_crud_round_trip() {
        let (remote, app) = test_admin(vec![], json!({})).await;

        let (status, created) = send(
            &app,
            request(
                "POST",
                "/admin/styles",
                Some(json!({"name": "Watercolor", "prompt": "soft watercolor"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(created["created_at"].is_u64());

        let (status, _) = send(
            &app,
            request(
                "PUT",
                &format!("/admin/styles/{id}"),
                Some(json!({"id": "ignored", "name": "Watercolor II", "prompt": "bolder"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored = remote.styles().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].name, "Watercolor II");

        let (status, _) = send(&app, request("DELETE", &format!("/admin/styles/{id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(remote.styles().await.is_empty());
    }

    #[tokio::test]
    async fn create_without_name_is_rejected() {
        let (remote, app) = test_admin(vec![], json!({})).await;
        let (status, json) = send(
            &app,
            request("POST", "/admin/styles", Some(json!({"name": " ", "prompt": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["type"], "invalid_request");
        assert_eq!(remote.style_writes(), 0);
    }

    #[tokio::test]
    async fn reorder_moves_and_renumbers() {
        let (remote, app) =
            test_admin(vec![style("a", 0), style("b", 1), style("c", 2)], json!({})).await;

        let (status, list) = send(
            &app,
            request("POST", "/admin/styles/reorder", Some(json!({"index": 2, "direction": "up"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&list), vec!["a", "c", "b"]);

        let (_, fresh) = send(&app, request("GET", "/admin/styles", None)).await;
        assert_eq!(ids(&fresh), vec!["a", "c", "b"]);
        assert_eq!(remote.style_writes(), 2);

        let (status, _) = send(
            &app,
            request("POST", "/admin/styles/reorder", Some(json!({"index": 9, "direction": "down"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reorder_during_read_outage_writes_nothing() {
        let (remote, app) = test_admin(vec![style("a", 0), style("b", 1)], json!({})).await;
        remote.set_fail_reads(true);

        let (status, json) = send(
            &app,
            request("POST", "/admin/styles/reorder", Some(json!({"index": 1, "direction": "up"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["type"], "remote_store_error");
        assert_eq!(remote.style_writes(), 0);

        let stored: Vec<String> = remote.styles().await.into_iter().map(|s| s.id).collect();
        assert_eq!(stored, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn import_then_export() {
        let (_, app) = test_admin(vec![], json!({})).await;

        let payload = json!([
            {"id": "x", "name": "X", "prompt": "px", "positionIndex": 0},
            {"id": "y", "name": "Y", "prompt": "py", "positionIndex": 1}
        ]);
        let (status, json) = send(&app, request("POST", "/admin/styles/import", Some(payload))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["imported"], 2);

        let response = app
            .clone()
            .oneshot(request("GET", "/admin/styles/export", None))
            .await
            .unwrap();
        assert!(
            response.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .contains("styleswap-styles.json")
        );
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let exported: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ids(&exported), vec!["x", "y"]);

        let (status, _) = send(
            &app,
            request("POST", "/admin/styles/import", Some(json!({"not": "a list"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_are_masked_and_patch_keeps_secrets() {
        let (remote, app) = test_admin(
            vec![],
            json!({
                "payment": {"keySecret": "rzp-live-secret-9876", "photoPrice": 8.0},
                "apiKeys": [{"id": "k1", "key": "AIza-stored-key-4321"}],
                "featureFlags": {"beta": true}
            }),
        )
        .await;

        let (status, shown) = send(&app, request("GET", "/admin/settings", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shown["payment"]["keySecret"], "…9876");
        assert_eq!(shown["apiKeys"][0]["key"], "…4321");
        assert_eq!(shown["paymentCurrencySymbol"], "₹");
        assert!(!shown.to_string().contains("rzp-live-secret"));

        // Send back what GET returned with one change.
        let mut patch = shown.clone();
        patch["payment"]["photoPrice"] = json!(12.5);
        let (status, _) = send(&app, request("PUT", "/admin/settings", Some(patch))).await;
        assert_eq!(status, StatusCode::OK);

        let stored = remote.settings().await.unwrap();
        assert_eq!(stored["payment"]["photoPrice"], 12.5);
        assert_eq!(stored["payment"]["keySecret"], "rzp-live-secret-9876");
        assert_eq!(stored["apiKeys"][0]["key"], "AIza-stored-key-4321");
        assert_eq!(stored["featureFlags"]["beta"], true);
    }

    #[tokio::test]
    async fn settings_patch_must_be_an_object() {
        let (remote, app) = test_admin(vec![], json!({})).await;
        let writes = remote.settings_writes();
        let (status, _) = send(&app, request("PUT", "/admin/settings", Some(json!([1, 2])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(remote.settings_writes(), writes);
    }

    #[tokio::test]
    async fn settings_patch_not_written_when_read_fails() {
        let (remote, app) = test_admin(vec![], json!({})).await;
        let writes = remote.settings_writes();
        remote.set_fail_reads(true);
        let (status, json) = send(
            &app,
            request("PUT", "/admin/settings", Some(json!({"tracking": {"enabled": true}}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["type"], "remote_store_error");
        assert_eq!(remote.settings_writes(), writes);
    }

    #[tokio::test]
    async fn key_lifecycle() {
        let (remote, app) = test_admin(vec![], json!({"apiKeys": []})).await;

        let (status, added) = send(
            &app,
            request("POST", "/admin/keys", Some(json!({"label": "primary", "key": "AIza-admin-key-5555"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(added["key"], "…5555");
        assert_eq!(added["status"], "active");
        let id = added["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            request("POST", "/admin/keys", Some(json!({"label": "dup", "key": "AIza-admin-key-5555"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = send(&app, request("GET", "/admin/keys", None)).await;
        assert_eq!(listed["keys"].as_array().unwrap().len(), 1);
        assert!(!listed.to_string().contains("AIza-admin"));

        let (status, reset) = send(&app, request("POST", &format!("/admin/keys/{id}/reset"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["status"], "active");

        let (_, pool) = send(&app, request("GET", "/admin/pool", None)).await;
        assert_eq!(pool["status"], "healthy");
        assert_eq!(pool["credentials_total"], 1);

        let (status, _) = send(&app, request("DELETE", &format!("/admin/keys/{id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, request("DELETE", &format!("/admin/keys/{id}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(remote.settings().await.unwrap()["apiKeys"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_unknown_key_is_not_found() {
        let (_, app) = test_admin(vec![], json!({"apiKeys": []})).await;
        let (status, json) = send(&app, request("POST", "/admin/keys/nope/reset", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["type"], "not_found");
    }
}
