//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::groq::DEFAULT_API_BASE;
use crate::wizard::{ContextualReplyPolicy, Mode};

/// Environment variables holding API keys, highest priority first.
pub const API_KEY_VARS: [&str; 3] = ["GROQ_KEY_1", "GROQ_KEY_2", "GROQ_KEY_3"];

/// Model used when `STELLAR_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Raw key values in priority order; `None` for unset variables.
    pub api_keys: Vec<Option<SecretString>>,
    /// Model identifier sent with every request.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Mode the session starts in.
    pub initial_mode: Mode,
    /// Whether each reply also gets a model-generated acknowledgement.
    pub contextual_replies: ContextualReplyPolicy,
    /// If set, logs go to a daily-rolling file here instead of stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            initial_mode: Mode::Material,
            contextual_replies: ContextualReplyPolicy::Always,
            log_dir: None,
        }
    }
}

impl PlannerConfig {
    /// Load from the process environment (after `.env`, if the caller loaded it).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_keys = API_KEY_VARS
            .iter()
            .map(|var| lookup(var).map(SecretString::from))
            .collect();

        let model = non_blank(lookup("STELLAR_MODEL")).unwrap_or(defaults.model);
        let api_base = non_blank(lookup("STELLAR_API_BASE")).unwrap_or(defaults.api_base);

        let initial_mode = match non_blank(lookup("STELLAR_MODE")) {
            Some(raw) => raw.parse::<Mode>().map_err(|message| ConfigError::InvalidValue {
                key: "STELLAR_MODE".to_string(),
                message,
            })?,
            None => defaults.initial_mode,
        };

        let contextual_replies = match non_blank(lookup("STELLAR_CONTEXTUAL_REPLIES")) {
            Some(raw) => parse_bool(&raw)
                .map(ContextualReplyPolicy::from_enabled)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "STELLAR_CONTEXTUAL_REPLIES".to_string(),
                    message: format!("expected true or false, got '{raw}'"),
                })?,
            None => defaults.contextual_replies,
        };

        let log_dir = non_blank(lookup("STELLAR_LOG_DIR")).map(PathBuf::from);

        Ok(Self {
            api_keys,
            model,
            api_base,
            initial_mode,
            contextual_replies,
            log_dir,
        })
    }

    /// Number of key variables that are set to something non-blank.
    pub fn configured_key_count(&self) -> usize {
        use secrecy::ExposeSecret;
        self.api_keys
            .iter()
            .flatten()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .count()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
