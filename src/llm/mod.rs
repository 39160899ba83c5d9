//! LLM integration for phish-guard.
//!
//! Supports:
//! - **Anthropic**: Messages API over `reqwest`, with tool use and image input
//!
//! `LlmProvider` is the seam the orchestrator talks to; tests plug in
//! scripted providers.

pub mod anthropic;
pub mod costs;
pub mod provider;
pub mod reasoning;

pub use anthropic::AnthropicProvider;
pub use provider::*;
pub use reasoning::{Reasoning, RespondOutput, RespondResult, TokenUsage};

use std::sync::Arc;

use crate::error::{ConfigError, LlmError};

/// Default model when `PHISH_GUARD_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Endpoint override; `None` uses the provider default.
    pub base_url: Option<String>,
}

impl LlmConfig {
    /// Build from `ANTHROPIC_API_KEY`, `PHISH_GUARD_MODEL` and
    /// `PHISH_GUARD_LLM_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;

        Ok(Self {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from(api_key),
            model: std::env::var("PHISH_GUARD_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("PHISH_GUARD_LLM_BASE_URL").ok(),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => {
            let mut provider = AnthropicProvider::new(config.api_key.clone(), &config.model);
            if let Some(ref url) = config.base_url {
                provider = provider.with_base_url(url);
            }
            tracing::info!("Using Anthropic (model: {})", config.model);
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_missing_key_still_constructs() {
        // The key is only checked by the API on the first request.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-3-5-haiku-latest".to_string(),
            base_url: None,
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "claude-3-5-haiku-latest");
    }

    #[test]
    fn test_create_provider_with_base_url() {
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: DEFAULT_MODEL.to_string(),
            base_url: Some("http://127.0.0.1:9/v1/messages".to_string()),
        };
        assert!(create_provider(&config).is_ok());
    }
}
