//! Web search tool
//!
//! Every provider returns the same shape to the model: a JSON array of
//! `{title, url, content}` objects. For Tavily the provider's own `results`
//! array is passed through untouched.

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::tools::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const TAVILY_API_BASE: &str = "https://api.tavily.com";
const SERPER_API_BASE: &str = "https://google.serper.dev";
const DUCKDUCKGO_API_BASE: &str = "https://api.duckduckgo.com";

#[derive(Debug, Clone)]
pub enum SearchEngine {
    Tavily { api_key: String },
    Serper { api_key: String },
    DuckDuckGo,
}

pub struct WebSearchTool {
    client: Client,
    engine: SearchEngine,
    api_base: Option<String>,
    max_results: usize,
}

fn tool_error(message: String) -> AgentError {
    AgentError::ToolError {
        tool_name: "web_search".to_string(),
        message,
    }
}

impl WebSearchTool {
    pub fn new(engine: SearchEngine) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            engine,
            api_base: None,
            max_results: 5,
        }
    }

    pub fn with_tavily_api_key(api_key: String) -> Self {
        Self::new(SearchEngine::Tavily { api_key })
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = Some(api_base.trim_end_matches('/').to_string());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    fn base<'a>(&'a self, default: &'a str) -> &'a str {
        self.api_base.as_deref().unwrap_or(default)
    }

    async fn send_json(&self, request: reqwest::RequestBuilder, provider: &str) -> Result<Value, AgentError> {
        let response = request
            .send()
            .await
            .map_err(|e| tool_error(format!("{} API request failed: {}", provider, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(tool_error(format!(
                "{} API returned status {}: {}",
                provider, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| tool_error(format!("Failed to parse {} response: {}", provider, e)))
    }

    async fn search_tavily(&self, api_key: &str, query: &str, max_results: usize) -> Result<String, AgentError> {
        let payload = json!({
            "api_key": api_key,
            "query": query,
            "search_depth": "basic",
            "include_answer": false,
            "include_images": false,
            "include_raw_content": false,
            "max_results": max_results
        });

        let request = self
            .client
            .post(format!("{}/search", self.base(TAVILY_API_BASE)))
            .json(&payload);
        let data = self.send_json(request, "Tavily").await?;

        let results = data.get("results").cloned().unwrap_or_else(|| json!([]));
        Ok(results.to_string())
    }

    async fn search_serper(&self, api_key: &str, query: &str, max_results: usize) -> Result<String, AgentError> {
        let request = self
            .client
            .post(format!("{}/search", self.base(SERPER_API_BASE)))
            .header("X-API-KEY", api_key)
            .json(&json!({"q": query, "num": max_results}));
        let data = self.send_json(request, "Serper").await?;

        let results: Vec<Value> = data["organic"]
            .as_array()
            .into_iter()
            .flatten()
            .take(max_results)
            .filter_map(|result| {
                Some(json!({
                    "title": result["title"].as_str()?,
                    "url": result["link"].as_str()?,
                    "content": result["snippet"].as_str().unwrap_or_default(),
                }))
            })
            .collect();

        Ok(Value::Array(results).to_string())
    }

    async fn search_duckduckgo(&self, query: &str, max_results: usize) -> Result<String, AgentError> {
        let url = format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base(DUCKDUCKGO_API_BASE),
            urlencoding::encode(query)
        );

        let request = self
            .client
            .get(&url)
            .header("User-Agent", concat!("parley/", env!("CARGO_PKG_VERSION")));
        let data = self.send_json(request, "DuckDuckGo").await?;

        let mut results = Vec::new();

        if let Some(abstract_text) = data["AbstractText"].as_str().filter(|s| !s.is_empty()) {
            results.push(json!({
                "title": data["Heading"].as_str().unwrap_or(query),
                "url": data["AbstractURL"].as_str().unwrap_or_default(),
                "content": abstract_text,
            }));
        }

        for topic in data["RelatedTopics"].as_array().into_iter().flatten() {
            if results.len() >= max_results {
                break;
            }
            if let (Some(text), Some(url)) = (topic["Text"].as_str(), topic["FirstURL"].as_str()) {
                results.push(json!({"title": text, "url": url, "content": text}));
            }
        }

        Ok(Value::Array(results).to_string())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "web_search".to_string(),
            description: "Search the web for information".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        // ReAct actions pass the raw input string instead of an object.
        let query = match &arguments {
            Value::String(query) => Some(query.as_str()),
            _ => arguments.get("query").and_then(|v| v.as_str()),
        }
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .ok_or_else(|| tool_error("Missing or invalid 'query' parameter".to_string()))?;

        let max_results = arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.max_results)
            .clamp(1, 10);

        log::info!("Web search: '{}' (max_results: {})", query, max_results);

        let results = match &self.engine {
            SearchEngine::Tavily { api_key } => self.search_tavily(api_key, query, max_results).await,
            SearchEngine::Serper { api_key } => self.search_serper(api_key, query, max_results).await,
            SearchEngine::DuckDuckGo => self.search_duckduckgo(query, max_results).await,
        }?;

        log::debug!("Web search results for '{}': {}", query, results);
        Ok(results)
    }
}
