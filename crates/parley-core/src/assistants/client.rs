use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::assistants::{
    Assistant, AssistantSpec, MessageList, Run, Thread, ThreadMessage, ToolOutput,
};
use crate::config::LlmConfig;
use crate::errors::AgentError;
use crate::llm::providers::{openai::OPENAI_API_BASE, resolve_api_key};

/// The subset of the Assistants API the run/poll adapter needs.
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AgentError>;

    async fn create_thread(&self) -> Result<Thread, AgentError>;

    async fn add_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage, AgentError>;

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AgentError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: &[ToolOutput],
    ) -> Result<Run, AgentError>;

    /// Messages of the thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;
}

#[derive(Debug, Clone)]
pub struct OpenAIAssistantsClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAIAssistantsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, AgentError> {
        let mut client = Self::new(resolve_api_key(config)?);
        if let Some(api_base) = &config.api_base {
            client = client.with_api_base(api_base.clone());
        }
        Ok(client)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.api_base, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.api_base, path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, AgentError> {
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to {}: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to read response ({}): {}", what, e)))?;

        log::debug!("Assistants API {} -> {}: {}", what, status, body);

        if !status.is_success() {
            return Err(AgentError::LLMError(format!(
                "Assistants API request to {} failed with status {}: {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| AgentError::ParsingError(format!("Invalid response ({}): {}", what, e)))
    }
}

#[async_trait]
impl AssistantsApi for OpenAIAssistantsClient {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AgentError> {
        let request = self.post("/assistants").json(&spec.to_request_body());
        let assistant: Assistant = self.send(request, "create assistant").await?;
        log::info!("Created assistant {} ({})", assistant.id, spec.name);
        Ok(assistant)
    }

    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let request = self.post("/threads").json(&json!({}));
        let thread: Thread = self.send(request, "create thread").await?;
        log::info!("Created thread {}", thread.id);
        Ok(thread)
    }

    async fn add_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        let request = self
            .post(&format!("/threads/{}/messages", thread_id))
            .json(&json!({"role": role, "content": content}));
        self.send(request, "add message").await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AgentError> {
        let mut body = json!({"assistant_id": assistant_id});
        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }
        let request = self.post(&format!("/threads/{}/runs", thread_id)).json(&body);
        self.send(request, "create run").await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let request = self.get(&format!("/threads/{}/runs/{}", thread_id, run_id));
        self.send(request, "retrieve run").await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: &[ToolOutput],
    ) -> Result<Run, AgentError> {
        let request = self
            .post(&format!(
                "/threads/{}/runs/{}/submit_tool_outputs",
                thread_id, run_id
            ))
            .json(&json!({"tool_outputs": tool_outputs}));
        self.send(request, "submit tool outputs").await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let request = self.get(&format!("/threads/{}/messages?order=desc", thread_id));
        let list: MessageList = self.send(request, "list messages").await?;
        Ok(list.data)
    }
}
