//! Configuration for Parley agents
//!
//! A single YAML document (`parley.yaml` by convention) selects the agent
//! strategy, the LLM vendor, tool credentials and prompts. Every section has
//! defaults, so running without a file is supported.

pub mod types;
pub mod loader;

pub use types::*;
pub use loader::*;


use crate::errors::AgentError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<ParleyConfig, AgentError> {
    ConfigLoader::from_file(path).await
}

/// Load `path` when it exists, otherwise fall back to defaults plus environment.
pub async fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<ParleyConfig, AgentError> {
    let path = path.as_ref();
    if path.exists() {
        ConfigLoader::from_file(path).await
    } else {
        log::info!("No config file at {}, using defaults", path.display());
        ConfigLoader::from_env_defaults().await
    }
}

/// Validate a configuration
pub fn validate_config(config: &ParleyConfig) -> Result<(), AgentError> {
    config.validate()
}
