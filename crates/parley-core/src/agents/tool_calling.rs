//! Native function-calling adapter
//!
//! Keeps the conversation locally and lets the model request tools through the
//! provider's function-calling API. Only user and assistant turns are kept;
//! tool traffic lives for the duration of one turn.

use async_trait::async_trait;
use std::sync::Arc;

use crate::agents::{ChatAgent, ToolCallingExecutor};
use crate::config::ParleyConfig;
use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::{create_llm_client, LLM};
use crate::memory::{ChatHistory, ConversationMemory};
use crate::tools::{ToolFactory, ToolRegistry};

pub struct ToolCallingAgent {
    name: String,
    system_prompt: String,
    executor: ToolCallingExecutor,
    history: ChatHistory,
}

impl ToolCallingAgent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LLM>,
        tools: ToolRegistry,
        max_steps: usize,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            executor: ToolCallingExecutor::new(llm, tools, max_steps),
            history: ChatHistory::new(),
        }
    }

    pub fn from_config(config: &ParleyConfig) -> Result<Self, AgentError> {
        let llm = create_llm_client(&config.llm)?;
        let tools = ToolFactory::create_default_registry(&config.tools);
        Ok(Self::new(
            config.agent.name.clone(),
            config.prompts.system_prompt(),
            llm,
            tools,
            config.agent.max_steps,
        ))
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }
}

#[async_trait]
impl ChatAgent for ToolCallingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(self.history.get_context());
        messages.push(Message::user(message));

        let outcome = self.executor.run(messages).await?;
        log::info!("{} answered in {} step(s)", self.name, outcome.steps);

        self.history.add_message(Message::user(message)).await?;
        self.history
            .add_message(Message::assistant(outcome.reply.clone()))
            .await?;
        Ok(outcome.reply)
    }

    async fn clear_chat(&mut self) -> Result<bool, AgentError> {
        self.history.clear();
        Ok(true)
    }
}
