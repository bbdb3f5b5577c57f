use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolMetadata>>,
}

/// Scripted `LLM` that pops one queued result per call and records its inputs.
#[derive(Clone, Default)]
pub struct MockLLM {
    responses: Arc<Mutex<VecDeque<Result<LLMResponse, AgentError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockLLM {
    pub fn new(responses: Vec<Result<LLMResponse, AgentError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(LLMResponse::text(*t))).collect())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLM for MockLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        self.calls.lock().unwrap().push(RecordedCall { messages, tools });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::LLMError("MockLLM has no responses left".to_string())))
    }
}
