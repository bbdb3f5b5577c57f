//! Configuration type definitions.
//!
//! Every section is optional in YAML; a file containing only `agent: {}` yields
//! a web-search assistant on `gpt-4o-mini` with the default polling budget.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AgentError;
use crate::prompts;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParleyConfig {
    #[serde(default)]
    pub agent: AgentDefinition,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub assistants: AssistantsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which adapter strategy drives the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Remote assistant run, polled until completion (OpenAI Assistants API).
    #[default]
    Assistants,
    /// Native tool-use loop over a chat/messages API.
    ToolCalling,
    /// Text ReAct protocol (Thought / Action / Observation).
    React,
    /// Agent/tools state graph with per-thread checkpoints.
    Graph,
    /// Persona-driven single-task crew.
    Crew,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Assistants,
        AgentKind::ToolCalling,
        AgentKind::React,
        AgentKind::Graph,
        AgentKind::Crew,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Assistants => "assistants",
            AgentKind::ToolCalling => "tool_calling",
            AgentKind::React => "react",
            AgentKind::Graph => "graph",
            AgentKind::Crew => "crew",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                AgentError::ConfigError(format!(
                    "Unknown agent kind '{}'. Expected one of: assistants, tool_calling, react, graph, crew",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub kind: AgentKind,
    /// Tool-calling rounds allowed per turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// ReAct thought/action iterations allowed per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Messages retained by bounded memories.
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
}

impl Default for AgentDefinition {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            kind: AgentKind::default(),
            max_steps: default_max_steps(),
            max_iterations: default_max_iterations(),
            memory_window: default_memory_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Falls back to the provider's default model when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl LlmConfig {
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| crate::llm::providers::get_default_model(&self.provider).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
    Custom {
        base_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<String>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            anthropic_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl LlmAuth {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_key_env: None,
        }
    }
}

/// Bounds for the Assistants run/poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantsConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_max_polling_attempts")]
    pub max_polling_attempts: usize,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

impl AssistantsConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

impl Default for AssistantsConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            max_polling_attempts: default_max_polling_attempts(),
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub date: bool,
    #[serde(default = "default_web_search")]
    pub web_search: Option<WebSearchConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            date: true,
            web_search: default_web_search(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: WebSearchProvider,
    #[serde(default)]
    pub auth: WebSearchAuth,
    #[serde(default = "default_max_search_results")]
    pub max_results: usize,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: WebSearchProvider::default(),
            auth: WebSearchAuth::default(),
            max_results: default_max_search_results(),
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebSearchProvider {
    #[default]
    Tavily,
    Serper,
    DuckDuckGo,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebSearchAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Persona sections joined into the system prompt, or a prompt file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub knowledge: Option<String>,
    /// Path relative to the config file; replaces the joined sections.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(skip)]
    pub assembled: Option<String>,
}

impl PromptConfig {
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(prompts::ROLE)
    }

    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or(prompts::GOAL)
    }

    pub fn instructions(&self) -> &str {
        self.instructions.as_deref().unwrap_or(prompts::INSTRUCTIONS)
    }

    pub fn knowledge(&self) -> &str {
        self.knowledge.as_deref().unwrap_or(prompts::KNOWLEDGE)
    }

    pub fn system_prompt(&self) -> String {
        if let Some(assembled) = &self.assembled {
            return assembled.clone();
        }
        [self.role(), self.goal(), self.instructions(), self.knowledge()].join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
    /// Load `.env` from the working directory, as the scripts did on import.
    #[serde(default = "default_true")]
    pub load_dotenv: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            variables: HashMap::new(),
            env_files: Vec::new(),
            load_dotenv: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_agent_name() -> String { "Parley Agent".to_string() }
fn default_assistant_name() -> String { "Web Search Assistant".to_string() }
fn default_max_steps() -> usize { 10 }
fn default_max_iterations() -> usize { 15 }
fn default_memory_window() -> usize { 50 }
fn default_max_tokens() -> u32 { 4096 }
fn default_max_polling_attempts() -> usize { 60 }
fn default_polling_interval_ms() -> u64 { 1000 }
fn default_max_search_results() -> usize { 5 }
fn default_web_search() -> Option<WebSearchConfig> { Some(WebSearchConfig::default()) }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl ParleyConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.name.trim().is_empty() {
            return Err(AgentError::ConfigError("Agent name cannot be empty".to_string()));
        }

        if self.agent.max_steps == 0 {
            return Err(AgentError::ConfigError("Agent max_steps must be greater than 0".to_string()));
        }

        if self.agent.max_iterations == 0 {
            return Err(AgentError::ConfigError("Agent max_iterations must be greater than 0".to_string()));
        }

        if self.agent.memory_window == 0 {
            return Err(AgentError::ConfigError("Agent memory_window must be greater than 0".to_string()));
        }

        if let Some(model) = &self.llm.model {
            if model.trim().is_empty() {
                return Err(AgentError::ConfigError("LLM model cannot be empty".to_string()));
            }
        }

        if let LlmProvider::Custom { base_url } = &self.llm.provider {
            if base_url.is_empty() {
                return Err(AgentError::ConfigError(
                    "Custom provider requires a valid 'base_url'".to_string(),
                ));
            }
        }

        if self.agent.kind == AgentKind::Assistants && self.llm.provider == LlmProvider::Anthropic {
            return Err(AgentError::ConfigError(
                "The assistants agent requires the openai provider".to_string(),
            ));
        }

        if self.assistants.max_polling_attempts == 0 {
            return Err(AgentError::ConfigError(
                "assistants.max_polling_attempts must be greater than 0".to_string(),
            ));
        }

        if let Some(web_search) = &self.tools.web_search {
            if web_search.max_results == 0 || web_search.max_results > 10 {
                return Err(AgentError::ConfigError(
                    "tools.web_search.max_results must be between 1 and 10".to_string(),
                ));
            }
        }

        Ok(())
    }
}
