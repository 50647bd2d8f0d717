//! Credential pool and first-success failover dispatch.
//!
//! The pool keeps one slot per configured key, in priority order. A key whose
//! client could not be built stays in the pool as a disabled slot so that
//! "key #N" means the same thing in every log line and diagnostic.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, warn};

use crate::error::{CredentialFailure, CredentialFailureKind, DispatchError, LlmError, display_index};

use super::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// One position in the credential pool.
pub enum CredentialSlot {
    /// A usable client handle.
    Ready(Arc<dyn LlmProvider>),
    /// Client construction failed; kept as a placeholder.
    Disabled { reason: String },
}

impl CredentialSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for CredentialSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(provider) => f.debug_tuple("Ready").field(&provider.name()).finish(),
            Self::Disabled { reason } => f.debug_struct("Disabled").field("reason", reason).finish(),
        }
    }
}

/// Ordered, immutable set of credential slots.
#[derive(Debug, Default)]
pub struct CredentialPool {
    slots: Vec<CredentialSlot>,
}

impl CredentialPool {
    /// Build a pool from raw configuration values.
    ///
    /// Missing and blank values are dropped, order is preserved, and each
    /// remaining secret is handed to `factory`. A factory error leaves a
    /// disabled slot at that position. Never fails, even if the result is
    /// empty.
    pub fn load<I, F>(raw_values: I, factory: F) -> Self
    where
        I: IntoIterator<Item = Option<SecretString>>,
        F: Fn(&SecretString) -> Result<Arc<dyn LlmProvider>, LlmError>,
    {
        use secrecy::ExposeSecret;

        let slots = raw_values
            .into_iter()
            .flatten()
            .filter(|secret| !secret.expose_secret().trim().is_empty())
            .enumerate()
            .map(|(index, secret)| match factory(&secret) {
                Ok(provider) => CredentialSlot::Ready(provider),
                Err(e) => {
                    warn!(
                        credential = display_index(index),
                        category = e.category(),
                        "API key could not be initialized; keeping it as a disabled slot"
                    );
                    CredentialSlot::Disabled {
                        reason: e.to_string(),
                    }
                }
            })
            .collect();

        Self { slots }
    }

    /// Build a pool directly from slots.
    pub fn from_slots(slots: Vec<CredentialSlot>) -> Self {
        Self { slots }
    }

    /// Total number of slots, disabled ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots with a usable client.
    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_ready()).count()
    }

    pub fn slots(&self) -> &[CredentialSlot] {
        &self.slots
    }
}

/// A successful dispatch.
#[derive(Debug)]
pub struct Dispatched {
    /// Generated text from the first credential that succeeded.
    pub text: String,
    /// 0-based pool index of that credential.
    pub credential_index: usize,
    /// Failures recorded on earlier slots before the success.
    pub failures: Vec<CredentialFailure>,
}

/// Sends a conversation through the credential pool, first success wins.
///
/// Shared read-only across sessions; each `send` is independent and always
/// starts from the first slot.
#[derive(Debug)]
pub struct FailoverDispatcher {
    pool: CredentialPool,
}

impl FailoverDispatcher {
    pub fn new(pool: CredentialPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Deliver `messages` to `model`, trying credentials strictly in order.
    ///
    /// One request per enabled slot, no retries or backoff. Disabled slots
    /// are recorded as `NotInitialized` and skipped. The error returned on
    /// exhaustion reports the last real request failure when there is one,
    /// so a trailing disabled slot never hides it.
    pub async fn send(&self, messages: &[ChatMessage], model: &str) -> Result<Dispatched, DispatchError> {
        if self.pool.is_empty() {
            warn!("Dispatch attempted with no API keys configured");
            return Err(DispatchError::NoCredentials);
        }

        let mut failures: Vec<CredentialFailure> = Vec::new();
        let mut last_request_failure: Option<usize> = None;
        let mut attempted = 0;

        for (index, slot) in self.pool.slots().iter().enumerate() {
            let provider = match slot {
                CredentialSlot::Ready(provider) => provider,
                CredentialSlot::Disabled { .. } => {
                    debug!(credential = display_index(index), "Skipping uninitialized API key");
                    failures.push(CredentialFailure {
                        index,
                        kind: CredentialFailureKind::NotInitialized,
                    });
                    continue;
                }
            };

            attempted += 1;
            let request = CompletionRequest::new(model, messages.to_vec());
            match provider.complete(request).await {
                Ok(response) => {
                    debug!(
                        credential = display_index(index),
                        output_tokens = response.output_tokens,
                        "Completion succeeded"
                    );
                    return Ok(Dispatched {
                        text: response.content,
                        credential_index: index,
                        failures,
                    });
                }
                Err(e) => {
                    warn!(
                        credential = display_index(index),
                        category = e.category(),
                        error = %e,
                        "API key failed; trying next key"
                    );
                    last_request_failure = Some(failures.len());
                    failures.push(CredentialFailure {
                        index,
                        kind: CredentialFailureKind::Request(e),
                    });
                }
            }
        }

        let last = last_request_failure.unwrap_or(failures.len() - 1);
        Err(DispatchError::Exhausted {
            attempted,
            failures,
            last,
        })
    }
}
