//! Provider abstraction for the external image-generation API
//!
//! Defines the `ImageGenerator` trait that decouples the failover dispatcher
//! from the concrete generation backend. `GeminiGenerator` is the HTTP
//! implementation; tests substitute scripted generators behind the same trait.
//!
//! A generator performs exactly one call with exactly one credential. Choosing
//! which credential to use, and what to do when it fails, belongs to the pool.

pub mod gemini;

pub use gemini::GeminiGenerator;

use common::Secret;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Classification of a failed generation call.
///
/// Every category keeps the pool moving to the next credential; only
/// `InvalidCredential` additionally retires the credential that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Rate-limit or capacity signal. The credential stays active.
    Transient,
    /// Authentication or revocation signal. The credential is marked invalid.
    InvalidCredential,
    /// Anything else (5xx, transport, malformed response). Handled like Transient.
    Unknown,
}

impl ErrorClassification {
    /// Whether the dispatcher should continue with the next credential.
    pub fn is_retryable(self) -> bool {
        true
    }

    /// Whether the credential that produced this error must be retired.
    pub fn is_terminal(self) -> bool {
        matches!(self, ErrorClassification::InvalidCredential)
    }

    /// Label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            ErrorClassification::Transient => "transient",
            ErrorClassification::InvalidCredential => "invalid_credential",
            ErrorClassification::Unknown => "unknown",
        }
    }
}

/// One generation call: source image, style instruction, optional refinement.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub style_prompt: String,
    pub refinement: Option<String>,
}

impl GenerationRequest {
    pub fn new(image: Vec<u8>, mime_type: impl Into<String>, style_prompt: impl Into<String>) -> Self {
        Self {
            image,
            mime_type: mime_type.into(),
            style_prompt: style_prompt.into(),
            refinement: None,
        }
    }

    pub fn with_refinement(mut self, refinement: impl Into<String>) -> Self {
        let refinement = refinement.into();
        self.refinement = if refinement.trim().is_empty() {
            None
        } else {
            Some(refinement)
        };
        self
    }

    /// Full instruction text sent alongside the image.
    pub fn instruction(&self) -> String {
        match &self.refinement {
            Some(refinement) => format!(
                "Transform this person into the following style: {}. Additional instructions: {}. \
                 Preserve the person's facial features and identity exactly.",
                self.style_prompt, refinement
            ),
            None => format!(
                "Transform this person into the following style: {}. Preserve the person's \
                 facial features and identity exactly. High-quality artistic output.",
                self.style_prompt
            ),
        }
    }
}

/// Image bytes returned by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Raw failure from a single generation call, before classification.
///
/// `status` is the HTTP status when the provider answered; `None` means the
/// request never produced a response (connect error, timeout, decode error).
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "provider returned {status}: {}", self.message),
            None => write!(f, "provider call failed: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderFailure {}

/// Abstraction over the external image-generation API.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn ImageGenerator>`).
pub trait ImageGenerator: Send + Sync {
    /// Identifier for logging (e.g. "gemini")
    fn id(&self) -> &str;

    /// Run one generation call authenticated with `credential`.
    ///
    /// Implementations must not retry with other credentials; they report the
    /// raw failure and let the caller decide.
    fn generate<'a>(
        &'a self,
        credential: &'a Secret<String>,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedImage, ProviderFailure>> + Send + 'a>>;
}
