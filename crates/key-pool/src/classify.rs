//! Failure classification for generation calls
//!
//! Maps a raw `ProviderFailure` to an `ErrorClassification`:
//!
//! - 429, or a quota/rate-limit phrase in the body → `Transient`
//! - 401/403, or an auth/revocation phrase in the body → `InvalidCredential`
//! - anything else (5xx, transport errors, empty responses) → `Unknown`
//!
//! Status codes win over body text. Auth phrases are checked before quota
//! phrases so a revoked key reported alongside a quota message is retired.

use provider::{ErrorClassification, ProviderFailure};

/// Body phrases meaning the credential itself is rejected. Matched lowercase.
const INVALID_SIGNALS: &[&str] = &[
    "api_key_invalid",
    "api key not valid",
    "permission_denied",
    "unauthenticated",
    "leaked",
    "revoked",
];

/// Body phrases meaning the credential is fine but out of capacity. Matched lowercase.
const TRANSIENT_SIGNALS: &[&str] = &["resource_exhausted", "quota", "rate limit", "rate_limit"];

/// Longest slice of the provider message kept in a reason.
const MAX_REASON_CHARS: usize = 200;

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub classification: ErrorClassification,
    pub reason: String,
}

impl Classified {
    pub fn retryable(&self) -> bool {
        self.classification.is_retryable()
    }

    pub fn terminal(&self) -> bool {
        self.classification.is_terminal()
    }
}

/// Classify a failed generation call.
pub fn classify(failure: &ProviderFailure) -> Classified {
    let body = failure.message.to_lowercase();
    let classification = match failure.status {
        Some(429) => ErrorClassification::Transient,
        Some(401 | 403) => ErrorClassification::InvalidCredential,
        _ if contains_any(&body, INVALID_SIGNALS) => ErrorClassification::InvalidCredential,
        _ if contains_any(&body, TRANSIENT_SIGNALS) => ErrorClassification::Transient,
        _ => ErrorClassification::Unknown,
    };

    let detail: String = failure.message.chars().take(MAX_REASON_CHARS).collect();
    let reason = match failure.status {
        Some(status) => format!("{} (HTTP {status}): {detail}", classification.label()),
        None => format!("{}: {detail}", classification.label()),
    };
    Classified {
        classification,
        reason,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
