//! Tool-calling loop over the `LLM` trait
//!
//! Shared by the adapters that let the model request tools through native
//! function calling: ask the model, run whatever it requests, feed the
//! results back, and stop once it answers in plain text.

use std::sync::Arc;

use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone)]
pub struct ExecutorOutcome {
    pub reply: String,
    /// Every message produced during the run, tool traffic included.
    pub transcript: Vec<Message>,
    pub steps: usize,
}

#[derive(Clone)]
pub struct ToolCallingExecutor {
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    max_steps: usize,
}

impl ToolCallingExecutor {
    pub fn new(llm: Arc<dyn LLM>, tools: ToolRegistry, max_steps: usize) -> Self {
        Self {
            llm,
            tools,
            max_steps: max_steps.max(1),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn run(&self, mut messages: Vec<Message>) -> Result<ExecutorOutcome, AgentError> {
        let tool_definitions = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.list_tools())
        };
        let start = messages.len();

        for step in 1..=self.max_steps {
            let response = self
                .llm
                .generate(messages.clone(), tool_definitions.clone())
                .await?;

            let tool_calls = match response.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => {
                    let reply = response
                        .content
                        .filter(|content| !content.trim().is_empty())
                        .ok_or(AgentError::EmptyReply)?;
                    messages.push(Message::assistant(reply.clone()));
                    return Ok(ExecutorOutcome {
                        reply,
                        transcript: messages.split_off(start),
                        steps: step,
                    });
                }
            };

            log::debug!("Step {}: model requested {} tool call(s)", step, tool_calls.len());
            messages.push(Message::assistant_with_tools(
                response.content.unwrap_or_default(),
                tool_calls.clone(),
            ));

            for call in tool_calls {
                let output = self.tools.dispatch_call(&call).await;
                messages.push(Message::tool_result(call.id, output));
            }
        }

        log::warn!("Tool-calling loop stopped after {} steps", self.max_steps);
        Err(AgentError::MaxStepsReached(self.max_steps))
    }
}
