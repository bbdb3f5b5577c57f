//! Conversation memory
//!
//! `ChatHistory` keeps every turn until cleared; `SlidingWindowMemory` keeps
//! only the most recent N messages.

pub mod history;
pub mod sliding_window;

use crate::core_types::{Message, Role};
use crate::errors::AgentError;
use async_trait::async_trait;
pub use history::ChatHistory;
pub use sliding_window::SlidingWindowMemory;

#[async_trait]
pub trait ConversationMemory: Send + Sync {
    async fn add_message(&mut self, message: Message) -> Result<(), AgentError>;
    fn get_context(&self) -> Vec<Message>;
    fn clear(&mut self);
    fn stats(&self) -> MemoryStats {
        MemoryStats::from_messages(&self.get_context())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryStats {
    pub message_count: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
}

impl MemoryStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        Self {
            message_count: messages.len(),
            user_turns: messages.iter().filter(|m| m.role == Role::User).count(),
            assistant_turns: messages.iter().filter(|m| m.role == Role::Assistant).count(),
        }
    }
}

/// Render messages as `role: content` lines for prompts that embed history as text.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
