//! Language model provider abstractions.
//!
//! The `LLM` trait is the seam every adapter except the Assistants one talks
//! through; providers translate `Message`/`ToolMetadata` to their wire format.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod providers;

pub use providers::{create_llm_client, create_llm_client_with_stop, AnthropicClient, OpenAIClient};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError>;
}
