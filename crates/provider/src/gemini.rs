//! Gemini image generation over the REST `generateContent` endpoint.
//!
//! One call per credential: the image travels as base64 `inlineData`, the
//! instruction as a text part. The first response part carrying `inlineData`
//! is the generated image.

use crate::{GeneratedImage, GenerationRequest, ImageGenerator, ProviderFailure};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Header carrying the API key. Keeps the key out of URLs and access logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataOut<'a>,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataOut<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineDataIn>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataIn {
    mime_type: Option<String>,
    data: String,
}

/// HTTP client for Gemini's image model.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn call(
        &self,
        credential: &Secret<String>,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, ProviderFailure> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Inline {
                        inline_data: InlineDataOut {
                            mime_type: &request.mime_type,
                            data: STANDARD.encode(&request.image),
                        },
                    },
                    RequestPart::Text {
                        text: request.instruction(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, credential.expose().as_str())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderFailure::transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ProviderFailure::http(status.as_u16(), text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transport(format!("invalid response body: {e}")))?;

        extract_image(parsed, &request.mime_type)
    }
}

/// Pull the first inline image out of a response.
fn extract_image(
    response: GenerateContentResponse,
    fallback_mime: &str,
) -> Result<GeneratedImage, ProviderFailure> {
    let inline = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .ok_or_else(|| {
            ProviderFailure::transport("no image data returned from model")
        })?;

    let bytes = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| ProviderFailure::transport(format!("invalid image encoding: {e}")))?;
    debug!(bytes = bytes.len(), "generation returned image");

    Ok(GeneratedImage {
        bytes,
        mime_type: inline.mime_type.unwrap_or_else(|| fallback_mime.to_string()),
    })
}

impl ImageGenerator for GeminiGenerator {
    fn id(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(
        &'a self,
        credential: &'a Secret<String>,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ProviderFailure>> + Send + 'a>> {
        Box::pin(self.call(credential, request))
    }
}
