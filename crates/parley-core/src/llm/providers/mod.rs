//! LLM provider implementations
//!
//! Each provider implements the common `LLM` trait over the vendor's REST API.

use std::sync::Arc;
use crate::config::{ConfigLoader, LlmConfig, LlmProvider};
use crate::llm::LLM;
use crate::errors::AgentError;

pub mod openai;
pub mod anthropic;

pub use openai::OpenAIClient;
pub use anthropic::AnthropicClient;

/// Create an LLM client based on the provider configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, AgentError> {
    match &config.provider {
        LlmProvider::OpenAI => openai::create_client(config, None),
        LlmProvider::Anthropic => anthropic::create_client(config),
        LlmProvider::Custom { base_url } => openai::create_client(config, Some(base_url)),
    }
}

/// Like `create_llm_client`, with generation halted at any of `stop`.
pub fn create_llm_client_with_stop(
    config: &LlmConfig,
    stop: Vec<String>,
) -> Result<Arc<dyn LLM>, AgentError> {
    match &config.provider {
        LlmProvider::OpenAI => Ok(Arc::new(openai::build_client(config, None)?.with_stop(stop))),
        LlmProvider::Anthropic => Ok(Arc::new(anthropic::build_client(config)?.with_stop(stop))),
        LlmProvider::Custom { base_url } => {
            Ok(Arc::new(openai::build_client(config, Some(base_url))?.with_stop(stop)))
        }
    }
}

/// Get the default model for a provider if none is specified
pub fn get_default_model(provider: &LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "gpt-4o-mini",
        LlmProvider::Anthropic => "claude-3-haiku-20240307",
        LlmProvider::Custom { .. } => "gpt-4o-mini",
    }
}

/// Resolve the API key, reading the environment at call time if the loader
/// did not already fill it in.
pub fn resolve_api_key(config: &LlmConfig) -> Result<String, AgentError> {
    config
        .auth
        .api_key
        .clone()
        .or_else(|| {
            let env_var = config
                .auth
                .api_key_env
                .as_deref()
                .unwrap_or_else(|| ConfigLoader::default_llm_key_env(&config.provider));
            std::env::var(env_var).ok()
        })
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            AgentError::ConfigError(format!(
                "No API key found for {:?}. Set llm.auth.api_key or llm.auth.api_key_env",
                config.provider
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmAuth;

    #[test]
    fn test_default_models() {
        assert_eq!(get_default_model(&LlmProvider::OpenAI), "gpt-4o-mini");
        assert_eq!(get_default_model(&LlmProvider::Anthropic), "claude-3-haiku-20240307");
    }

    #[test]
    fn test_explicit_key_wins() {
        let config = LlmConfig {
            auth: LlmAuth::with_api_key("sk-explicit"),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "sk-explicit");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = LlmConfig {
            auth: LlmAuth {
                api_key: None,
                api_key_env: Some("PARLEY_TEST_UNSET_KEY_VARIABLE".to_string()),
            },
            ..Default::default()
        };
        assert!(matches!(
            resolve_api_key(&config),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_create_client_for_each_provider() {
        for provider in [
            LlmProvider::OpenAI,
            LlmProvider::Anthropic,
            LlmProvider::Custom {
                base_url: "http://localhost:8080/v1".to_string(),
            },
        ] {
            let config = LlmConfig {
                provider,
                auth: LlmAuth::with_api_key("key"),
                ..Default::default()
            };
            assert!(create_llm_client(&config).is_ok());
        }
    }
}
