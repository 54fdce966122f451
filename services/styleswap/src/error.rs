//! HTTP error responses
//!
//! Every handler error renders as
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Handler error carrying its HTTP status and error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

impl From<catalog_sync::Error> for ApiError {
    fn from(err: catalog_sync::Error) -> Self {
        use catalog_sync::Error;
        let message = err.to_string();
        match err {
            Error::Remote(_) => Self::new(StatusCode::BAD_GATEWAY, "remote_store_error", message),
            Error::Import(_) | Error::Reorder(_) | Error::Invalid(_) => Self::bad_request(message),
            Error::Serialize(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}

impl From<key_pool::Error> for ApiError {
    fn from(err: key_pool::Error) -> Self {
        use key_pool::Error;
        let message = err.to_string();
        match err {
            Error::NoCredentials => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "configuration_error", message)
            }
            Error::PoolExhausted { failures, .. } => {
                let details = serde_json::to_value(&failures).unwrap_or_default();
                Self::new(StatusCode::BAD_GATEWAY, "pool_exhausted", message)
                    .with_details(serde_json::json!({ "attempts": details }))
            }
            Error::NotFound(_) => Self::not_found(message),
            Error::Invalid(_) => Self::bad_request(message),
            Error::Settings(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let mut error = serde_json::json!({
            "type": self.kind,
            "message": self.message,
            "request_id": request_id,
        });
        if let Some(details) = self.details {
            error["details"] = details;
        }
        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            serde_json::json!({ "error": error }).to_string(),
        )
            .into_response()
    }
}
