//! LLM integration for Stellar Planner.
//!
//! - `provider`: message types and the `LlmProvider` trait
//! - `groq`: Groq's OpenAI-compatible chat completions over reqwest
//! - `failover`: the credential pool and first-success dispatcher
//!
//! Every configured key gets its own `GroqClient`; the dispatcher walks them
//! in priority order for each request.

pub mod failover;
pub mod groq;
pub mod provider;

pub use failover::{CredentialPool, CredentialSlot, Dispatched, FailoverDispatcher};
pub use groq::GroqClient;
pub use provider::*;

use std::sync::Arc;

use crate::config::PlannerConfig;

/// Build the credential pool from configuration, one Groq client per key.
pub fn create_pool(config: &PlannerConfig) -> CredentialPool {
    let pool = CredentialPool::load(config.api_keys.iter().cloned(), |key| {
        GroqClient::new(key, &config.api_base).map(|c| Arc::new(c) as Arc<dyn LlmProvider>)
    });
    tracing::info!(
        keys = pool.len(),
        enabled = pool.enabled_count(),
        model = %config.model,
        "Credential pool loaded"
    );
    pool
}

/// Convenience: pool plus dispatcher, ready to share across sessions.
pub fn create_dispatcher(config: &PlannerConfig) -> Arc<FailoverDispatcher> {
    Arc::new(FailoverDispatcher::new(create_pool(config)))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config_with(keys: Vec<Option<&str>>) -> PlannerConfig {
        PlannerConfig {
            api_keys: keys
                .into_iter()
                .map(|k| k.map(SecretString::from))
                .collect(),
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn create_pool_counts_configured_keys() {
        let config = config_with(vec![Some("gsk_one"), None, Some("gsk_three")]);
        let pool = create_pool(&config);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.enabled_count(), 2);
    }

    #[test]
    fn create_pool_disables_unusable_key() {
        let config = config_with(vec![Some("gsk_one"), Some("bad\nkey")]);
        let pool = create_pool(&config);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.enabled_count(), 1);
    }
}
