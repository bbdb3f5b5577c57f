//! Core library for Parley: interchangeable chat agents over LLM vendor APIs.
//!
//! Every agent answers through the same contract, [`agents::ChatAgent`]:
//! `chat` runs one conversational turn and `clear_chat` forgets the
//! conversation. What differs is how a turn is driven:
//!
//! - **Assistants**: a remote assistant run on the OpenAI Assistants API,
//!   polled until it completes, with local tool execution on `requires_action`
//! - **Tool calling**: a native function-calling loop over a chat/messages API
//! - **ReAct**: a text `Thought / Action / Observation` protocol
//! - **Graph**: an `agent ⇄ tools` state graph with per-thread checkpoints
//! - **Crew**: a role/goal/backstory persona working one task per turn
//!
//! All of them share the `date` and `web_search` tools, the LLM provider
//! clients and the YAML configuration loaded through [`config::ConfigLoader`].

pub mod agent_factory;
pub mod agents;
pub mod assistants;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod tools;

pub use agent_factory::AgentFactory;
pub use agents::{AgentKind, ChatAgent};
pub use config::*;
pub use errors::{AgentError, APOLOGY};
pub use llm::LLM;

#[cfg(test)]
pub mod test_utils;
