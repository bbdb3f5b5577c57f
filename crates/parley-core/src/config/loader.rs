//! Configuration loader for YAML files and environment resolution
//!
//! Credentials never live in the YAML itself unless the user puts them there:
//! the loader fills `api_key` fields from the environment after `.env` files
//! have been applied.

use crate::config::types::*;
use crate::errors::AgentError;
use std::env;
use std::path::Path;
use tokio::fs;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ParleyConfig, AgentError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let base_dir = path.parent();
        Self::from_str(&content, base_dir).await
    }

    /// Load configuration from a YAML string
    pub async fn from_str(
        content: &str,
        base_dir: Option<&Path>,
    ) -> Result<ParleyConfig, AgentError> {
        let config: ParleyConfig = if content.trim().is_empty() {
            ParleyConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| AgentError::ConfigError(format!("Failed to parse YAML config: {}", e)))?
        };

        Self::finish(config, base_dir).await
    }

    /// Defaults plus whatever the environment provides. Used when no config file exists.
    pub async fn from_env_defaults() -> Result<ParleyConfig, AgentError> {
        Self::finish(ParleyConfig::default(), None).await
    }

    async fn finish(
        mut config: ParleyConfig,
        base_dir: Option<&Path>,
    ) -> Result<ParleyConfig, AgentError> {
        Self::resolve_environment(&mut config, base_dir)?;
        Self::resolve_prompts(&mut config, base_dir).await?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_environment(
        config: &mut ParleyConfig,
        base_dir: Option<&Path>,
    ) -> Result<(), AgentError> {
        for env_file in &config.environment.env_files {
            let path = match base_dir {
                Some(dir) if env_file.is_relative() => dir.join(env_file),
                _ => env_file.clone(),
            };
            if path.exists() {
                dotenv::from_path(&path).map_err(|e| {
                    AgentError::ConfigError(format!(
                        "Failed to load env file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                log::debug!("Loaded environment from {}", path.display());
            } else {
                log::warn!("Env file {} not found, skipping", path.display());
            }
        }

        if config.environment.load_dotenv {
            // A missing .env is the common case.
            if let Ok(path) = dotenv::dotenv() {
                log::debug!("Loaded environment from {}", path.display());
            }
        }

        for (key, value) in &config.environment.variables {
            env::set_var(key, value);
        }

        Self::resolve_llm_auth(&config.llm.provider, &mut config.llm.auth);

        if let Some(web_search) = &mut config.tools.web_search {
            Self::resolve_web_search_auth(&web_search.provider, &mut web_search.auth);
        }

        Ok(())
    }

    async fn resolve_prompts(
        config: &mut ParleyConfig,
        base_dir: Option<&Path>,
    ) -> Result<(), AgentError> {
        let Some(file) = config.prompts.file.clone() else {
            return Ok(());
        };

        let path = match base_dir {
            Some(dir) if file.is_relative() => dir.join(&file),
            _ => file,
        };

        let content = fs::read_to_string(&path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read prompt file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.prompts.assembled = Some(content.trim().to_string());
        Ok(())
    }

    /// Environment variable consulted for the LLM key when none is configured.
    pub fn default_llm_key_env(provider: &LlmProvider) -> &'static str {
        match provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Custom { .. } => "CUSTOM_API_KEY",
        }
    }

    fn resolve_llm_auth(provider: &LlmProvider, auth: &mut LlmAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            if let Ok(api_key) = env::var(Self::default_llm_key_env(provider)) {
                auth.api_key = Some(api_key);
            }
        }
    }

    fn resolve_web_search_auth(provider: &WebSearchProvider, auth: &mut WebSearchAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            let default_env = match provider {
                WebSearchProvider::Tavily => Some("TAVILY_API_KEY"),
                WebSearchProvider::Serper => Some("SERPER_API_KEY"),
                WebSearchProvider::DuckDuckGo => None,
            };
            if let Some(api_key) = default_env.and_then(|var| env::var(var).ok()) {
                auth.api_key = Some(api_key);
            }
        }
    }
}
