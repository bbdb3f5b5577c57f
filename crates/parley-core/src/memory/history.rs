use crate::core_types::Message;
use crate::errors::AgentError;
use crate::memory::ConversationMemory;
use async_trait::async_trait;

/// Unbounded, append-only transcript. Only `clear` removes messages.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl ConversationMemory for ChatHistory {
    async fn add_message(&mut self, message: Message) -> Result<(), AgentError> {
        self.push(message);
        Ok(())
    }

    fn get_context(&self) -> Vec<Message> {
        self.messages.clone()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }
}
