//! Error types for Stellar Planner.

use std::time::Duration;

/// Top-level error type for the planner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors for a single request against a single credential.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} could not be initialized: {reason}")]
    ClientInit { provider: String, reason: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Short, stable name for the failure kind. Safe to show and log.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClientInit { .. } => "client_init",
            Self::RequestFailed { .. } => "request_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::AuthFailed { .. } => "auth_failed",
            Self::Json(_) => "json",
        }
    }
}

/// Why one credential slot did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum CredentialFailureKind {
    #[error("client not initialized for this key")]
    NotInitialized,

    #[error("{0}")]
    Request(#[source] LlmError),
}

/// A failure recorded against one credential during a dispatch.
#[derive(Debug, thiserror::Error)]
#[error("key #{} {kind}", display_index(*.index))]
pub struct CredentialFailure {
    /// 0-based position in the credential pool.
    pub index: usize,
    pub kind: CredentialFailureKind,
}

impl CredentialFailure {
    /// Category for diagnostics, e.g. `"auth_failed"` or `"not_initialized"`.
    pub fn category(&self) -> &'static str {
        match &self.kind {
            CredentialFailureKind::NotInitialized => "not_initialized",
            CredentialFailureKind::Request(e) => e.category(),
        }
    }
}

/// 1-based index shown to users and in logs.
pub fn display_index(index: usize) -> usize {
    index + 1
}

fn exhausted_message(attempted: usize, failures: &[CredentialFailure], last: usize) -> String {
    let cause = failures
        .get(last)
        .map(ToString::to_string)
        .unwrap_or_else(|| "none recorded".to_string());
    format!(
        "All {} API keys failed ({attempted} attempted). Last error: {cause}",
        failures.len()
    )
}

/// Failure of a whole dispatch across the credential pool.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No API keys configured")]
    NoCredentials,

    #[error("{}", exhausted_message(*.attempted, .failures, *.last))]
    Exhausted {
        /// Number of enabled credentials a request was sent through.
        attempted: usize,
        /// Every recorded failure, in pool order.
        failures: Vec<CredentialFailure>,
        /// Index into `failures` of the failure reported as the cause.
        last: usize,
    },
}

impl DispatchError {
    /// The failure reported as the cause of exhaustion, if any.
    pub fn last_failure(&self) -> Option<&CredentialFailure> {
        match self {
            Self::NoCredentials => None,
            Self::Exhausted { failures, last, .. } => failures.get(*last),
        }
    }
}

/// Dialogue and session-level errors. Converted to notices by the controller.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Answer all {remaining} remaining question(s) before generating the final output")]
    FlowIncomplete { remaining: usize },

    #[error("This action is only available in the combined house + material mode")]
    NoCompositeFlow,

    #[error("Generate the final output for the {flow} flow first")]
    NotFinalized { flow: String },

    #[error("There is no next flow; use finish to wrap up")]
    NoNextFlow,

    #[error("The {next} flow is still ahead; proceed to it first")]
    NotLastFlow { next: String },

    #[error("Failed to generate final output: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for the planner.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request_failure(index: usize) -> CredentialFailure {
        CredentialFailure {
            index,
            kind: CredentialFailureKind::Request(LlmError::AuthFailed {
                provider: "groq".to_string(),
            }),
        }
    }

    #[test]
    fn credential_failure_display_is_one_based() {
        let failure = request_failure(0);
        assert_eq!(
            failure.to_string(),
            "key #1 Authentication failed for provider groq"
        );
        assert_eq!(failure.category(), "auth_failed");

        let skipped = CredentialFailure {
            index: 2,
            kind: CredentialFailureKind::NotInitialized,
        };
        assert_eq!(skipped.to_string(), "key #3 client not initialized for this key");
        assert_eq!(skipped.category(), "not_initialized");
    }

    #[test]
    fn exhausted_embeds_last_failure() {
        let err = DispatchError::Exhausted {
            attempted: 2,
            failures: vec![request_failure(0), request_failure(1)],
            last: 1,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All 2 API keys failed (2 attempted)"));
        assert!(msg.contains("Last error: key #2"));
        assert_eq!(err.last_failure().map(|f| f.index), Some(1));
    }

    #[test]
    fn no_credentials_has_no_last_failure() {
        assert!(DispatchError::NoCredentials.last_failure().is_none());
    }

    #[test]
    fn llm_error_categories() {
        let rate = LlmError::RateLimited {
            provider: "groq".to_string(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(rate.category(), "rate_limited");
        let invalid = LlmError::InvalidResponse {
            provider: "groq".to_string(),
            reason: "no choices".to_string(),
        };
        assert_eq!(invalid.category(), "invalid_response");
    }
}
