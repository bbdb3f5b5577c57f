//! Tools the model may request during a turn
//!
//! Every adapter shares the same two tools (`date` and `web_search`) through a
//! `ToolRegistry`. Dispatch by name never fails: unknown names and tool errors
//! become output strings that are handed back to the model.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ToolsConfig, WebSearchProvider};
use crate::core_types::ToolCall;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;

pub mod date;
pub mod web_search;

pub use date::{Clock, DateTool, FixedClock, SystemClock};
pub use web_search::{SearchEngine, WebSearchTool};

/// Output returned for a tool name nobody registered.
pub const UNSUPPORTED_TOOL: &str = "Unsupported tool.";

#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, arguments: Value) -> Result<String, AgentError>;
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name;
        self.tools.insert(name, tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions sorted by name, so request bodies are stable.
    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        let mut tools: Vec<ToolMetadata> = self.tools.values().map(|tool| tool.metadata()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.list_tools().into_iter().map(|tool| tool.name).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool and always produce an output string.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> String {
        let Some(tool) = self.get_tool(name) else {
            log::warn!("Model requested unknown tool '{}'", name);
            return UNSUPPORTED_TOOL.to_string();
        };

        log::info!("Executing tool '{}' with arguments {}", name, arguments);
        match tool.execute(arguments).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("Tool '{}' failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }

    /// Like `dispatch`, for arguments that arrive as a raw JSON string.
    /// An empty string means no arguments.
    pub async fn dispatch_raw(&self, name: &str, raw_arguments: &str) -> String {
        match parse_arguments(raw_arguments) {
            Ok(arguments) => self.dispatch(name, arguments).await,
            Err(e) => {
                log::error!("Invalid arguments for tool '{}': {}", name, e);
                format!("Error: {}", e)
            }
        }
    }
}

impl ToolRegistry {
    /// Dispatch a model tool call. Arguments a provider could not decode
    /// arrive as a JSON string and are reported back as an error output.
    pub async fn dispatch_call(&self, call: &ToolCall) -> String {
        match &call.arguments {
            Value::String(raw) => self.dispatch_raw(&call.name, raw).await,
            arguments => self.dispatch(&call.name, arguments.clone()).await,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_arguments(raw: &str) -> Result<Value, AgentError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| AgentError::ParsingError(format!("Invalid tool arguments JSON: {}", e)))
}

pub struct ToolFactory;

impl ToolFactory {
    pub fn create_date() -> Arc<dyn Tool> {
        Arc::new(DateTool::new())
    }

    pub fn create_web_search_from_config(config: &crate::config::WebSearchConfig) -> Arc<dyn Tool> {
        Arc::new(Self::build_web_search(config))
    }

    pub fn build_web_search(config: &crate::config::WebSearchConfig) -> WebSearchTool {
        let engine = match (&config.provider, &config.auth.api_key) {
            (WebSearchProvider::Tavily, Some(key)) => SearchEngine::Tavily { api_key: key.clone() },
            (WebSearchProvider::Serper, Some(key)) => SearchEngine::Serper { api_key: key.clone() },
            (WebSearchProvider::DuckDuckGo, _) => SearchEngine::DuckDuckGo,
            (provider, None) => {
                log::warn!(
                    "No API key configured for {:?} web search, falling back to DuckDuckGo",
                    provider
                );
                SearchEngine::DuckDuckGo
            }
        };

        let mut tool = WebSearchTool::new(engine).with_max_results(config.max_results);
        if let Some(api_base) = &config.api_base {
            tool = tool.with_api_base(api_base.clone());
        }
        tool
    }

    pub fn create_default_registry(config: &ToolsConfig) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        if config.date {
            registry.register_tool(Self::create_date());
        }
        if let Some(web_search) = config.web_search.as_ref().filter(|ws| ws.enabled) {
            registry.register_tool(Self::create_web_search_from_config(web_search));
        }
        registry
    }
}
