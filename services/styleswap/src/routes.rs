//! Public API
//!
//! Endpoints:
//! - GET  /health               pool status and uptime
//! - GET  /metrics              Prometheus exposition
//! - GET  /styles?refresh=bool  catalog in display order
//! - GET  /pricing?coupon=CODE  photo price with an optional discount
//! - POST /generate             restyle one photo

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use catalog_sync::{ConfigStore, ContentCache};
use key_pool::FailoverDispatcher;
use metrics_exporter_prometheus::PrometheusHandle;
use provider::GenerationRequest;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::metrics::{record_generation, track_requests};

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Shared state for public handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: ContentCache,
    pub settings: Arc<ConfigStore>,
    pub dispatcher: Arc<FailoverDispatcher>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
    /// Largest decoded source image, in bytes.
    pub max_upload_bytes: usize,
}

/// Build the public router.
///
/// The request body limit leaves room for base64 expansion of the largest
/// accepted image plus the JSON envelope.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    let body_limit = state.max_upload_bytes / 3 * 4 + 64 * 1024;
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/styles", get(styles_handler))
        .route("/pricing", get(pricing_handler))
        .route("/generate", post(generate_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// 200 while at least one credential (or the fallback) can serve, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut pool = state.dispatcher.pool().health().await;
    if let Some(summary) = pool.as_object_mut() {
        summary.remove("credentials");
    }
    let status = pool["status"].as_str().unwrap_or("unhealthy").to_string();
    let code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": status,
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "pool": pool,
        })
        .to_string(),
    )
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[derive(Debug, Deserialize)]
struct StylesQuery {
    #[serde(default)]
    refresh: bool,
}

async fn styles_handler(
    State(state): State<AppState>,
    Query(query): Query<StylesQuery>,
) -> impl IntoResponse {
    Json(state.cache.read(query.refresh).await)
}

#[derive(Debug, Deserialize)]
struct PricingQuery {
    coupon: Option<String>,
}

async fn pricing_handler(
    State(state): State<AppState>,
    Query(query): Query<PricingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings.get().await;
    let discount = match query.coupon.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => {
            settings
                .coupon(code)
                .ok_or_else(|| ApiError::not_found(format!("coupon {code} is not valid")))?
                .discount_percent
        }
        None => 0,
    };

    let payment = &settings.payment;
    let price = payment.photo_price * f64::from(100 - discount.min(100)) / 100.0;
    Ok(Json(serde_json::json!({
        "enabled": payment.enabled,
        "gateway": payment.gateway,
        "keyId": payment.key_id,
        "currency": payment.currency,
        "currencySymbol": payment.currency_symbol(),
        "photoPrice": payment.photo_price,
        "discountPercent": discount,
        "price": (price * 100.0).round() / 100.0,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    /// Raw base64 or a `data:<mime>;base64,` URL.
    image: String,
    mime_type: Option<String>,
    style_id: Option<String>,
    prompt: Option<String>,
    refinement: Option<String>,
}

/// Split a data URL into its mime type and payload. Plain base64 passes through.
fn split_data_url(image: &str) -> (Option<&str>, &str) {
    match image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
    {
        Some((header, data)) => (
            header.strip_suffix(";base64").filter(|mime| !mime.is_empty()),
            data,
        ),
        None => (None, image),
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;

    let (url_mime, data) = split_data_url(body.image.trim());
    let image = STANDARD
        .decode(data.trim())
        .map_err(|e| ApiError::bad_request(format!("image is not valid base64: {e}")))?;
    if image.is_empty() {
        return Err(ApiError::bad_request("image must not be empty"));
    }
    if image.len() > state.max_upload_bytes {
        return Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "invalid_request",
            format!("image exceeds {} bytes", state.max_upload_bytes),
        ));
    }
    let mime_type = url_mime
        .map(str::to_string)
        .or(body.mime_type)
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

    let style_prompt = match (body.style_id.as_deref(), body.prompt.as_deref()) {
        (Some(id), _) => {
            let styles = state.cache.read(false).await;
            let style = styles
                .into_iter()
                .find(|s| s.id == id)
                .ok_or_else(|| ApiError::not_found(format!("style {id} not found")))?;
            style.prompt
        }
        (None, Some(prompt)) if !prompt.trim().is_empty() => prompt.trim().to_string(),
        _ => return Err(ApiError::bad_request("styleId or prompt is required")),
    };

    let mut request = GenerationRequest::new(image, mime_type, style_prompt);
    if let Some(refinement) = body.refinement {
        request = request.with_refinement(refinement);
    }
    debug!(bytes = request.image.len(), mime_type = %request.mime_type, "generation requested");

    let started = Instant::now();
    let result = state.dispatcher.dispatch(&request).await;
    let elapsed = started.elapsed().as_secs_f64();
    let generated = match result {
        Ok(generated) => {
            record_generation("success", elapsed);
            generated
        }
        Err(e) => {
            record_generation("failed", elapsed);
            return Err(e.into());
        }
    };

    info!(bytes = generated.bytes.len(), elapsed_secs = elapsed, "image generated");
    Ok(Json(serde_json::json!({
        "image": STANDARD.encode(&generated.bytes),
        "mimeType": generated.mime_type,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use key_pool::CredentialPool;
    use provider::{GeneratedImage, ImageGenerator, ProviderFailure};
    use remote_store::{LocalStore, MemoryStore, RemoteStore, Settings, StyleTemplate};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Answers with the instruction it was sent, or a fixed failure for listed keys.
    struct Echo {
        reject: Vec<(String, ProviderFailure)>,
        instructions: Mutex<Vec<String>>,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                reject: Vec::new(),
                instructions: Mutex::new(Vec::new()),
            }
        }

        fn rejecting(key: &str, failure: ProviderFailure) -> Self {
            Self {
                reject: vec![(key.to_string(), failure)],
                ..Self::new()
            }
        }
    }

    impl ImageGenerator for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        fn generate<'a>(
            &'a self,
            credential: &'a Secret<String>,
            request: &'a GenerationRequest,
        ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ProviderFailure>> + Send + 'a>>
        {
            Box::pin(async move {
                self.instructions.lock().unwrap().push(request.instruction());
                if let Some((_, failure)) = self.reject.iter().find(|(k, _)| k == credential.expose()) {
                    return Err(failure.clone());
                }
                Ok(GeneratedImage {
                    bytes: request.image.iter().rev().copied().collect(),
                    mime_type: "image/png".into(),
                })
            })
        }
    }

    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    fn style(id: &str, prompt: &str) -> StyleTemplate {
        StyleTemplate {
            id: id.into(),
            name: format!("Style {id}"),
            prompt: prompt.into(),
            description: String::new(),
            image_url: String::new(),
            position_index: None,
            auto_apply: false,
            created_at: Some(1),
        }
    }

    async fn test_state(
        styles: Vec<StyleTemplate>,
        settings: serde_json::Value,
        generator: Arc<Echo>,
    ) -> (Arc<MemoryStore>, AppState) {
        let remote = Arc::new(MemoryStore::with_styles(styles));
        remote.save_settings(&settings).await.unwrap();
        let config = Arc::new(ConfigStore::new(remote.clone(), Settings::default()));
        let pool = Arc::new(CredentialPool::new(config.clone(), None));
        let state = AppState {
            cache: ContentCache::new(remote.clone(), Arc::new(LocalStore::in_memory())),
            settings: config,
            dispatcher: Arc::new(FailoverDispatcher::new(pool, generator)),
            prometheus: test_prometheus_handle(),
            started_at: Instant::now(),
            max_upload_bytes: 1024,
        };
        (remote, state)
    }

    fn one_key() -> serde_json::Value {
        json!({"apiKeys": [{"id": "k1", "key": "AIza-key-one-0001", "label": "primary"}]})
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_pool_without_secrets() {
        let (_, state) = test_state(vec![], one_key(), Arc::new(Echo::new())).await;
        let response = build_router(state, 10).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["pool"]["credentials_active"], 1);
        assert!(json["pool"].get("credentials").is_none());
        assert!(json["uptime_seconds"].is_u64());
        assert!(!json.to_string().contains("AIza"));
    }

    #[tokio::test]
    async fn health_is_unavailable_without_credentials() {
        let (_, state) = test_state(vec![], json!({"apiKeys": []}), Arc::new(Echo::new())).await;
        let response = build_router(state, 10).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "unhealthy");
    }

    #[tokio::test]
    async fn metrics_endpoint_is_prometheus_text() {
        let (_, state) = test_state(vec![], one_key(), Arc::new(Echo::new())).await;
        let response = build_router(state, 10).oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn styles_come_back_in_position_order() {
        let mut first = style("a", "first");
        first.position_index = Some(1);
        let mut second = style("b", "second");
        second.position_index = Some(0);
        let (_, state) = test_state(vec![first, second], one_key(), Arc::new(Echo::new())).await;

        let response = build_router(state, 10)
            .oneshot(get("/styles?refresh=true"))
            .await
            .unwrap();
        let json = json_body(response).await;
        let ids: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn generate_with_style_uses_its_prompt() {
        let generator = Arc::new(Echo::new());
        let (_, state) = test_state(
            vec![style("noir", "Film noir portrait")],
            one_key(),
            generator.clone(),
        )
        .await;

        let response = build_router(state, 10)
            .oneshot(post_json(
                "/generate",
                json!({"image": "data:image/png;base64,AQID", "styleId": "noir", "refinement": "add rain"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["image"], STANDARD.encode([3u8, 2, 1]));
        assert_eq!(json["mimeType"], "image/png");

        let instructions = generator.instructions.lock().unwrap().clone();
        assert_eq!(instructions.len(), 1);
        assert!(instructions[0].contains("Film noir portrait"));
        assert!(instructions[0].contains("Additional instructions: add rain."));
    }

    #[tokio::test]
    async fn generate_with_free_prompt() {
        let (_, state) = test_state(vec![], one_key(), Arc::new(Echo::new())).await;
        let response = build_router(state, 10)
            .oneshot(post_json("/generate", json!({"image": "AQID", "prompt": "watercolor"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_rejects_bad_input() {
        let (_, state) = test_state(vec![], one_key(), Arc::new(Echo::new())).await;
        let app = build_router(state, 10);

        let cases = [
            (json!({"image": "AQID"}), StatusCode::BAD_REQUEST),
            (json!({"image": "AQID", "prompt": "  "}), StatusCode::BAD_REQUEST),
            (json!({"image": "not base64!", "prompt": "x"}), StatusCode::BAD_REQUEST),
            (json!({"image": "", "prompt": "x"}), StatusCode::BAD_REQUEST),
            (json!({"image": "AQID", "styleId": "missing"}), StatusCode::NOT_FOUND),
            (json!({"prompt": "x"}), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (body, expected) in cases {
            let response = app
                .clone()
                .oneshot(post_json("/generate", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "body: {body}");
            assert!(json_body(response).await["error"]["type"].is_string());
        }
    }

    #[tokio::test]
    async fn generate_rejects_oversized_image() {
        let (_, state) = test_state(vec![], one_key(), Arc::new(Echo::new())).await;
        let image = STANDARD.encode(vec![7u8; 1025]);
        let response = build_router(state, 10)
            .oneshot(post_json("/generate", json!({"image": image, "prompt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn generate_without_credentials_is_unavailable() {
        let (_, state) = test_state(vec![], json!({"apiKeys": []}), Arc::new(Echo::new())).await;
        let response = build_router(state, 10)
            .oneshot(post_json("/generate", json!({"image": "AQID", "prompt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"]["type"], "configuration_error");
    }

    #[tokio::test]
    async fn rejected_key_is_retired_and_reported() {
        let generator = Arc::new(Echo::rejecting(
            "AIza-key-one-0001",
            ProviderFailure::http(400, "API key not valid. Please pass a valid API key."),
        ));
        let (remote, state) = test_state(vec![], one_key(), generator).await;

        let response = build_router(state, 10)
            .oneshot(post_json("/generate", json!({"image": "AQID", "prompt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = json_body(response).await;
        assert_eq!(json["error"]["type"], "pool_exhausted");
        assert_eq!(json["error"]["details"]["attempts"][0]["credential"], "primary");
        assert!(!json.to_string().contains("AIza-key-one"));

        let stored = remote.settings().await.unwrap();
        assert_eq!(stored["apiKeys"][0]["status"], "invalid");
    }

    #[tokio::test]
    async fn pricing_applies_coupon() {
        let settings = json!({
            "payment": {"currency": "USD", "photoPrice": 10.0},
            "coupons": [{"code": "SAVE25", "discountPercent": 25}]
        });
        let (_, state) = test_state(vec![], settings, Arc::new(Echo::new())).await;
        let app = build_router(state, 10);

        let plain = json_body(app.clone().oneshot(get("/pricing")).await.unwrap()).await;
        assert_eq!(plain["currencySymbol"], "$");
        assert_eq!(plain["price"], 10.0);
        assert_eq!(plain["gateway"], "Razorpay");

        let discounted =
            json_body(app.clone().oneshot(get("/pricing?coupon=save25")).await.unwrap()).await;
        assert_eq!(discounted["discountPercent"], 25);
        assert_eq!(discounted["price"], 7.5);

        let unknown = app.oneshot(get("/pricing?coupon=NOPE")).await.unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn data_url_prefix_is_split() {
        assert_eq!(
            split_data_url("data:image/webp;base64,AAAA"),
            (Some("image/webp"), "AAAA")
        );
        assert_eq!(split_data_url("AAAA"), (None, "AAAA"));
        assert_eq!(split_data_url("data:;base64,AAAA"), (None, "AAAA"));
    }
}
