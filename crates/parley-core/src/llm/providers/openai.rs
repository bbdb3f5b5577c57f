use crate::config::LlmConfig;
use crate::core_types::{LLMResponse, Message, Role, ToolCall, Usage};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use crate::tools::parse_arguments;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat Completions client with function calling.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stop: Vec<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
            model,
            temperature: None,
            max_tokens: None,
            stop: Vec::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Stop sequences, used by the ReAct adapter to cut generation at `Observation:`.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, messages: &[Message], tools: Option<&[ToolMetadata]>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temp) = self.temperature {
            body["temperature"] = temp.into();
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        if !self.stop.is_empty() {
            body["stop"] = json!(self.stop);
        }

        if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
            log::debug!("Sending {} tool definitions to OpenAI", tools.len());
            let formatted_tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema
                        }
                    })
                })
                .collect();
            body["tools"] = formatted_tools.into();
            body["tool_choice"] = "auto".into();
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut message = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content
                });

                if msg.role == Role::Tool {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        message["tool_call_id"] = json!(tool_call_id);
                    }
                }

                if msg.role == Role::Assistant && msg.has_tool_calls() {
                    let formatted: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|tc| {
                            json!({
                                "id": tc.id.clone().unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": match &tc.arguments {
                                        Value::String(raw) => raw.clone(),
                                        arguments => arguments.to_string(),
                                    }
                                }
                            })
                        })
                        .collect();
                    message["tool_calls"] = json!(formatted);
                    if msg.content.is_empty() {
                        message["content"] = Value::Null;
                    }
                }

                message
            })
            .collect()
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, AgentError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .ok_or_else(|| AgentError::ParsingError("No choices in response".to_string()))?;

        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());

        let mut parsed_calls = Vec::new();
        for call in message["tool_calls"].as_array().into_iter().flatten() {
            let Some(name) = call["function"]["name"].as_str() else {
                log::warn!("Skipping tool call without a function name: {}", call);
                continue;
            };
            let id = call["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            let raw_arguments = call["function"]["arguments"].as_str().unwrap_or("");
            // Undecodable arguments stay raw; dispatch reports the error to the model.
            let arguments = parse_arguments(raw_arguments).unwrap_or_else(|e| {
                log::warn!("Tool call '{}' has malformed arguments: {}", name, e);
                Value::String(raw_arguments.to_string())
            });
            parsed_calls.push(ToolCall {
                id: Some(id),
                name: name.to_string(),
                arguments,
            });
        }
        let tool_calls = if parsed_calls.is_empty() { None } else { Some(parsed_calls) };

        if content.is_none() && tool_calls.is_none() {
            return Err(AgentError::ParsingError(
                "Response has neither content nor tool calls".to_string(),
            ));
        }

        let usage = response.get("usage").and_then(|usage| {
            Some(Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64()? as u32,
                completion_tokens: usage["completion_tokens"].as_u64()? as u32,
                total_tokens: usage["total_tokens"].as_u64()? as u32,
            })
        });

        Ok(LLMResponse {
            content,
            tool_calls,
            finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages, tools.as_deref());

        log::debug!("OpenAI API request to {} with {} messages", url, messages.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to read response: {}", e)))?;

        log::debug!("OpenAI API response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(AgentError::LLMError(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}

/// Create an OpenAI (or OpenAI-compatible, when `base_url` is given) client from configuration
pub fn create_client(config: &LlmConfig, base_url: Option<&str>) -> Result<Arc<dyn LLM>, AgentError> {
    Ok(Arc::new(build_client(config, base_url)?))
}

pub fn build_client(config: &LlmConfig, base_url: Option<&str>) -> Result<OpenAIClient, AgentError> {
    let api_key = super::resolve_api_key(config)?;

    let mut client = OpenAIClient::new(api_key, config.model_name())
        .with_temperature(config.parameters.temperature);

    if config.parameters.max_tokens > 0 {
        client = client.with_max_tokens(config.parameters.max_tokens);
    }

    if let Some(api_base) = base_url.or(config.api_base.as_deref()) {
        client = client.with_api_base(api_base.to_string());
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmAuth;
    use crate::test_utils::{MockHttpServer, MockResponse};

    fn test_client() -> OpenAIClient {
        OpenAIClient::new("test-key".to_string(), "gpt-4o-mini".to_string())
    }

    #[test]
    fn test_openai_client_creation() {
        let client = test_client().with_temperature(0.7).with_max_tokens(1000);

        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.temperature, Some(0.7));
        assert_eq!(client.max_tokens, Some(1000));
        assert_eq!(client.api_base, OPENAI_API_BASE);
    }

    #[test]
    fn test_message_formatting() {
        let client = test_client();
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("Hello!"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall {
                    id: Some("call_1".to_string()),
                    name: "date".to_string(),
                    arguments: json!({}),
                }],
            ),
            Message::tool_result(Some("call_1".to_string()), "October 16, 2026"),
        ];

        let formatted = client.format_messages(&messages);
        assert_eq!(formatted.len(), 4);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[1]["content"], "Hello!");
        assert_eq!(formatted[2]["tool_calls"][0]["function"]["name"], "date");
        assert_eq!(formatted[2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert!(formatted[2]["content"].is_null());
        assert_eq!(formatted[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_body_includes_tools_and_stop() {
        let client = test_client().with_stop(vec!["\nObservation:".to_string()]);
        let tools = vec![ToolMetadata {
            name: "date".to_string(),
            description: "Get the current date".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        }];

        let body = client.build_request_body(&[Message::user("hi")], Some(&tools));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "date");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["stop"][0], "\nObservation:");
    }

    #[test]
    fn test_parse_tool_call_with_empty_arguments() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "date", "arguments": ""}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let parsed = test_client().parse_response(response).unwrap();
        let calls = parsed.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, json!({}));
        assert_eq!(parsed.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_parse_keeps_malformed_arguments_raw() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_bad",
                        "type": "function",
                        "function": {"name": "date", "arguments": "{\"tz\": "}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let client = test_client();
        let calls = client.parse_response(response).unwrap().tool_calls.unwrap();
        assert_eq!(calls[0].arguments, json!("{\"tz\": "));

        let formatted = client.format_messages(&[Message::assistant_with_tools("", calls)]);
        assert_eq!(formatted[0]["tool_calls"][0]["function"]["arguments"], "{\"tz\": ");
    }

    #[test]
    fn test_parse_synthesises_missing_tool_call_id() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "type": "function",
                        "function": {"name": "date", "arguments": "{}"}
                    }]
                }
            }]
        });

        let calls = test_client().parse_response(response).unwrap().tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.as_deref().unwrap().starts_with("call_"));
    }

    #[test]
    fn test_parse_empty_choices_is_error() {
        let result = test_client().parse_response(json!({"choices": []}));
        assert!(matches!(result, Err(AgentError::ParsingError(_))));
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockHttpServer::start(vec![(
            "POST /v1/chat/completions",
            vec![MockResponse::ok(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Hello there"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            }))],
        )])
        .await;

        let config = LlmConfig {
            auth: LlmAuth::with_api_key("sk-test"),
            api_base: Some(format!("{}/v1", server.address())),
            ..Default::default()
        };
        let client = build_client(&config, None).unwrap();

        let response = client.generate(vec![Message::user("Hi")], None).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("Hello there"));
        assert_eq!(response.usage.unwrap().total_tokens, 7);

        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("authorization").as_deref(), Some("Bearer sk-test"));
        assert_eq!(requests[0].body["model"], "gpt-4o-mini");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_errors() {
        let server = MockHttpServer::start(vec![(
            "POST /v1/chat/completions",
            vec![MockResponse::status(500, json!({"error": {"message": "boom"}}))],
        )])
        .await;

        let client = test_client().with_api_base(format!("{}/v1", server.address()));
        let result = client.generate(vec![Message::user("Hi")], None).await;
        assert!(matches!(result, Err(AgentError::LLMError(_))));
        server.shutdown().await;
    }
}
