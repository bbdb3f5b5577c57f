//! Chat agent adapters
//!
//! Each adapter drives an LLM vendor API with tools using a different strategy,
//! but all of them expose the same two operations: `chat` and `clear_chat`.

use async_trait::async_trait;

use crate::errors::{AgentError, APOLOGY};

pub mod assistants;
pub mod crew;
pub mod executor;
pub mod graph;
pub mod react;
pub mod tool_calling;

pub use crate::config::AgentKind;
pub use assistants::{AssistantsAgent, AssistantsOptions};
pub use crew::CrewAgent;
pub use executor::{ExecutorOutcome, ToolCallingExecutor};
pub use graph::GraphAgent;
pub use react::{ReactAgent, ReactOutputParser, ReactStep};
pub use tool_calling::ToolCallingAgent;

#[async_trait]
pub trait ChatAgent: Send + Sync {
    fn name(&self) -> &str;

    /// One conversational turn, with failures surfaced.
    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError>;

    /// One conversational turn. Never fails: errors are logged and replaced
    /// by a fixed apology.
    async fn chat(&mut self, message: &str) -> String {
        match self.try_chat(message).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("{}: error in chat: {}", self.name(), e);
                APOLOGY.to_string()
            }
        }
    }

    /// Forget the conversation. Returns `true` once the context is reset.
    async fn clear_chat(&mut self) -> Result<bool, AgentError>;
}
