//! Fixed-size sliding window memory.
//!
//! Keeps only the N most recent messages, evicting the oldest first.

use crate::core_types::{Message, Role};
use crate::errors::AgentError;
use crate::memory::ConversationMemory;
use async_trait::async_trait;
use std::collections::VecDeque;

pub struct SlidingWindowMemory {
    messages: VecDeque<Message>,
    max_messages: usize,
}

impl SlidingWindowMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_messages),
            max_messages: max_messages.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl ConversationMemory for SlidingWindowMemory {
    async fn add_message(&mut self, message: Message) -> Result<(), AgentError> {
        if self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        Ok(())
    }

    fn get_context(&self) -> Vec<Message> {
        // The window must open on a user or system turn, never mid-exchange.
        let skip = self
            .messages
            .iter()
            .take_while(|msg| matches!(msg.role, Role::Tool | Role::Assistant))
            .count();
        self.messages.iter().skip(skip).cloned().collect()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_evicts_oldest_messages() {
        let mut memory = SlidingWindowMemory::new(3);
        for i in 0..5 {
            memory.add_message(Message::user(format!("m{}", i))).await.unwrap();
        }

        let context = memory.get_context();
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_leading_tool_results_are_dropped_from_context() {
        let mut memory = SlidingWindowMemory::new(3);
        memory.add_message(Message::user("q1")).await.unwrap();
        memory
            .add_message(Message::tool_result(Some("1".to_string()), "result"))
            .await
            .unwrap();
        memory.add_message(Message::assistant("a1")).await.unwrap();
        memory.add_message(Message::user("q2")).await.unwrap();

        let context = memory.get_context();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "q2");
    }

    #[tokio::test]
    async fn test_odd_window_never_opens_on_assistant_reply() {
        let mut memory = SlidingWindowMemory::new(3);
        for (question, answer) in [("u1", "a1"), ("u2", "a2")] {
            memory.add_message(Message::user(question)).await.unwrap();
            memory.add_message(Message::assistant(answer)).await.unwrap();
        }

        assert_eq!(memory.len(), 3);
        let context = memory.get_context();
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["u2", "a2"]);
        assert_eq!(context[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_clear_empties_window() {
        let mut memory = SlidingWindowMemory::new(4);
        memory.add_message(Message::user("hello")).await.unwrap();
        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.stats().message_count, 0);
    }
}
