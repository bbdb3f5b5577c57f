//! Anthropic Messages API client
//!
//! System messages travel in the top-level `system` field; tool results are
//! folded into the following user turn as `tool_result` blocks.

use std::sync::Arc;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{LlmConfig, ModelParameters};
use crate::core_types::{LLMResponse, Message, Role, ToolCall, Usage};
use crate::errors::AgentError;
use crate::llm::{LLM, ToolMetadata};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    parameters: ModelParameters,
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseContent>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorEnvelope {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        model: String,
        parameters: ModelParameters,
        api_base: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string()),
            model,
            parameters,
            stop_sequences: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    fn convert_messages(&self, messages: Vec<Message>) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut anthropic_messages = Vec::new();
        let mut user_content = Vec::new();
        let mut assistant_content = Vec::new();

        for message in messages {
            match message.role {
                Role::System => system_parts.push(message.content),
                Role::User | Role::Tool => {
                    if !assistant_content.is_empty() {
                        anthropic_messages.push(AnthropicMessage {
                            role: "assistant",
                            content: std::mem::take(&mut assistant_content),
                        });
                    }
                    if message.role == Role::Tool {
                        user_content.push(AnthropicContent::ToolResult {
                            tool_use_id: message.tool_call_id.unwrap_or_default(),
                            content: message.content,
                        });
                    } else {
                        user_content.push(AnthropicContent::Text { text: message.content });
                    }
                }
                Role::Assistant => {
                    if !user_content.is_empty() {
                        anthropic_messages.push(AnthropicMessage {
                            role: "user",
                            content: std::mem::take(&mut user_content),
                        });
                    }

                    // Empty text blocks are rejected by the API.
                    if !message.content.is_empty() {
                        assistant_content.push(AnthropicContent::Text { text: message.content });
                    }

                    for tool_call in message.tool_calls.into_iter().flatten() {
                        assistant_content.push(AnthropicContent::ToolUse {
                            id: tool_call
                                .id
                                .unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4().simple())),
                            name: tool_call.name,
                            input: tool_call.arguments,
                        });
                    }
                }
            }
        }

        if !user_content.is_empty() {
            anthropic_messages.push(AnthropicMessage {
                role: "user",
                content: user_content,
            });
        }
        if !assistant_content.is_empty() {
            anthropic_messages.push(AnthropicMessage {
                role: "assistant",
                content: assistant_content,
            });
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        };

        (system, anthropic_messages)
    }

    fn convert_tools(&self, tools: Option<Vec<ToolMetadata>>) -> Vec<AnthropicTool> {
        tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| AnthropicTool {
                name: tool.name,
                description: tool.description,
                input_schema: tool.input_schema,
            })
            .collect()
    }

    fn convert_response(&self, response: AnthropicResponse) -> LLMResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                AnthropicResponseContent::Text { text } => content.push_str(&text),
                AnthropicResponseContent::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id: Some(id),
                    name,
                    arguments: input,
                }),
                AnthropicResponseContent::Other => {}
            }
        }

        LLMResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            finish_reason: response.stop_reason,
            usage: response.usage.map(|usage| Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            }),
        }
    }
}

#[async_trait]
impl LLM for AnthropicClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        let (system, anthropic_messages) = self.convert_messages(messages);

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.parameters.max_tokens,
            messages: anthropic_messages,
            system,
            temperature: if self.parameters.temperature > 0.0 {
                Some(self.parameters.temperature)
            } else {
                None
            },
            stop_sequences: self.stop_sequences.clone(),
            tools: self.convert_tools(tools),
        };

        let anthropic_version = self
            .parameters
            .anthropic_version
            .as_deref()
            .unwrap_or(DEFAULT_ANTHROPIC_VERSION);

        log::debug!("Anthropic API request with {} messages", request.messages.len());

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", anthropic_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(envelope) = serde_json::from_str::<AnthropicErrorEnvelope>(&error_text) {
                return Err(AgentError::LLMError(format!(
                    "Anthropic API error ({}): {}",
                    status, envelope.error.message
                )));
            }

            return Err(AgentError::LLMError(format!(
                "HTTP {} error: {}",
                status, error_text
            )));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ParsingError(format!("Failed to parse response: {}", e)))?;

        Ok(self.convert_response(anthropic_response))
    }
}

/// Create an Anthropic LLM client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, AgentError> {
    Ok(Arc::new(build_client(config)?))
}

pub fn build_client(config: &LlmConfig) -> Result<AnthropicClient, AgentError> {
    let api_key = super::resolve_api_key(config)?;
    Ok(AnthropicClient::new(
        api_key,
        config.model_name(),
        config.parameters.clone(),
        config.api_base.clone(),
    ))
}
