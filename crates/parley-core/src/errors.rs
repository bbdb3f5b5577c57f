//! Error types shared by every chat agent adapter.
//!
//! Failures are grouped by where they come from (the LLM vendor, a tool, the
//! remote run, configuration) so adapters can log something useful before
//! collapsing the failure into the user-facing apology.

use thiserror::Error;

use crate::assistants::RunStatus;

/// Reply returned by `ChatAgent::chat` whenever a turn fails.
pub const APOLOGY: &str = "Sorry, I encountered an error processing your request.";

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Tool execution failed for '{tool_name}': {message}")]
    ToolError { tool_name: String, message: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Run ended with status: {0}")]
    RunEnded(RunStatus),
    #[error("Polling exceeded maximum attempts ({0})")]
    PollingExhausted(usize),
    #[error("Run completed without an assistant reply")]
    EmptyReply,
    #[error("Maximum steps reached ({0})")]
    MaxStepsReached(usize),
    #[error("Graph error: {0}")]
    GraphError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::LLMError(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ParsingError(err.to_string())
    }
}
