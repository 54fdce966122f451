//! Failover dispatch across the credential pool
//!
//! Classification decides what happens to a credential; `first_success`
//! decides when to stop. Attempts are strictly sequential: one call in flight
//! per dispatch, so a burst of failures never burns quota on several
//! credentials at once.

use std::future::Future;
use std::sync::Arc;

use provider::{ErrorClassification, GeneratedImage, GenerationRequest, ImageGenerator};
use remote_store::Credential;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::classify::classify;
use crate::error::{Error, Result};
use crate::pool::CredentialPool;

/// Why one credential did not produce an image.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    /// Label or masked key, never the secret.
    pub credential: String,
    #[serde(serialize_with = "classification_label")]
    pub classification: ErrorClassification,
    pub reason: String,
}

fn classification_label<S: serde::Serializer>(
    classification: &ErrorClassification,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(classification.label())
}

/// Run `attempt` over `items` in order, one at a time, until one succeeds.
///
/// Returns the first success, or every failure in attempt order.
pub async fn first_success<T, O, E, F, Fut>(
    items: Vec<T>,
    mut attempt: F,
) -> std::result::Result<O, Vec<E>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = std::result::Result<O, E>>,
{
    let mut failures = Vec::with_capacity(items.len());
    for item in items {
        match attempt(item).await {
            Ok(output) => return Ok(output),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}

fn record_attempt(outcome: &'static str) {
    metrics::counter!("generation_attempts_total", "outcome" => outcome).increment(1);
}

fn record_dispatch(result: &'static str) {
    metrics::counter!("generation_dispatch_total", "result" => result).increment(1);
}

pub struct FailoverDispatcher {
    pool: Arc<CredentialPool>,
    generator: Arc<dyn ImageGenerator>,
}

impl FailoverDispatcher {
    pub fn new(pool: Arc<CredentialPool>, generator: Arc<dyn ImageGenerator>) -> Self {
        Self { pool, generator }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Generate an image, trying active credentials until one succeeds.
    ///
    /// Fails with `NoCredentials` before any call when the pool is empty and
    /// no fallback is configured, and with `PoolExhausted` once every
    /// credential has failed. Concurrent dispatches are independent.
    pub async fn dispatch(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let credentials = self.pool.active().await;
        if credentials.is_empty() {
            error!("no generation credentials configured");
            record_dispatch("no_credentials");
            return Err(Error::NoCredentials);
        }

        let attempted = credentials.len();
        debug!(credentials = attempted, generator = self.generator.id(), "dispatching generation");
        match first_success(credentials, |credential| self.attempt(credential, request)).await {
            Ok(image) => {
                record_dispatch("success");
                Ok(image)
            }
            Err(failures) => {
                error!(attempted, "all generation credentials failed");
                record_dispatch("exhausted");
                Err(Error::PoolExhausted {
                    attempted,
                    failures,
                })
            }
        }
    }

    async fn attempt(
        &self,
        credential: Credential,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedImage, AttemptFailure> {
        let label = credential.display_label();
        let failure = match self.generator.generate(&credential.secret, request).await {
            Ok(image) => {
                info!(credential = %label, bytes = image.bytes.len(), "generation succeeded");
                record_attempt("success");
                return Ok(image);
            }
            Err(failure) => failure,
        };

        let classified = classify(&failure);
        record_attempt(classified.classification.label());
        warn!(
            credential = %label,
            classification = classified.classification.label(),
            reason = %classified.reason,
            "generation attempt failed"
        );

        if classified.terminal() {
            if let Err(e) = self.pool.mark_invalid(&credential.id).await {
                warn!(credential = %label, error = %e, "failed to retire credential");
            }
        }

        Err(AttemptFailure {
            credential: label,
            classification: classified.classification,
            reason: classified.reason,
        })
    }
}
