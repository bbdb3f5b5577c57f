//! Text-protocol ReAct adapter
//!
//! The model never sees native tool definitions. It is prompted to reason in
//! `Thought / Action / Action Input` lines; each action is parsed from the
//! completion, executed, and appended to the scratchpad as an `Observation`
//! until the model emits a `Final Answer`.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use crate::agents::ChatAgent;
use crate::config::ParleyConfig;
use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::{create_llm_client_with_stop, LLM};
use crate::memory::{render_transcript, ConversationMemory, SlidingWindowMemory};
use crate::prompts::{self, REACT_TEMPLATE};
use crate::tools::{ToolFactory, ToolRegistry};

const FINAL_ANSWER: &str = "Final Answer:";

/// Completions are cut here so the model cannot invent its own observations.
pub const OBSERVATION_STOP: &str = "\nObservation:";

const MISSING_ACTION: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
const MISSING_ACTION_INPUT: &str = "Invalid Format: Missing 'Action Input:' after 'Action:'";
const ACTION_AND_ANSWER: &str =
    "Parsing LLM output produced both a final answer and a parse-able action";

#[derive(Debug, Clone, PartialEq)]
pub enum ReactStep {
    Action { tool: String, input: Value },
    Finish(String),
}

pub struct ReactOutputParser {
    action: Regex,
    action_only: Regex,
    action_input_only: Regex,
}

impl ReactOutputParser {
    pub fn new() -> Self {
        Self {
            action: Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
                .expect("valid action regex"),
            action_only: Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").expect("valid action regex"),
            action_input_only: Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
                .expect("valid action input regex"),
        }
    }

    /// Parse one completion. Errors carry the text to feed back as the observation.
    pub fn parse(&self, text: &str) -> Result<ReactStep, AgentError> {
        let includes_answer = text.contains(FINAL_ANSWER);

        if let Some(captures) = self.action.captures(text) {
            if includes_answer {
                return Err(AgentError::ParsingError(format!("{}: {}", ACTION_AND_ANSWER, text)));
            }
            let tool = captures[1].trim().to_string();
            let raw_input = captures[2]
                .split(OBSERVATION_STOP)
                .next()
                .unwrap_or_default()
                .trim_matches(' ')
                .trim_matches('"');
            return Ok(ReactStep::Action {
                tool,
                input: action_input(raw_input),
            });
        }

        if includes_answer {
            let answer = text.rsplit(FINAL_ANSWER).next().unwrap_or_default().trim();
            return Ok(ReactStep::Finish(answer.to_string()));
        }

        if !self.action_only.is_match(text) {
            Err(AgentError::ParsingError(MISSING_ACTION.to_string()))
        } else if !self.action_input_only.is_match(text) {
            Err(AgentError::ParsingError(MISSING_ACTION_INPUT.to_string()))
        } else {
            Err(AgentError::ParsingError(format!("Could not parse LLM output: `{}`", text)))
        }
    }
}

impl Default for ReactOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON objects are passed to the tool as-is; anything else as a plain string.
fn action_input(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::String(raw.trim().to_string()),
    }
}

pub struct ReactAgent {
    name: String,
    persona: String,
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    parser: ReactOutputParser,
    memory: SlidingWindowMemory,
    max_iterations: usize,
}

impl ReactAgent {
    pub fn new(
        name: impl Into<String>,
        persona: impl Into<String>,
        llm: Arc<dyn LLM>,
        tools: ToolRegistry,
        max_iterations: usize,
        memory_window: usize,
    ) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            llm,
            tools,
            parser: ReactOutputParser::new(),
            memory: SlidingWindowMemory::new(memory_window),
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn from_config(config: &ParleyConfig) -> Result<Self, AgentError> {
        let llm = create_llm_client_with_stop(&config.llm, vec![OBSERVATION_STOP.to_string()])?;
        let tools = ToolFactory::create_default_registry(&config.tools);
        Ok(Self::new(
            config.agent.name.clone(),
            config.prompts.system_prompt(),
            llm,
            tools,
            config.agent.max_iterations,
            config.agent.memory_window,
        ))
    }

    pub fn memory(&self) -> &SlidingWindowMemory {
        &self.memory
    }

    fn tool_descriptions(&self) -> String {
        self.tools
            .list_tools()
            .iter()
            .map(|tool| format!("{}: {}", tool.name, tool.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_prompt(&self, input: &str, chat_history: &str, scratchpad: &str) -> String {
        let tools = self.tool_descriptions();
        let tool_names = self.tools.tool_names().join(", ");
        prompts::render(
            REACT_TEMPLATE,
            &[
                ("tools", &tools),
                ("tool_names", &tool_names),
                ("chat_history", chat_history),
                ("input", input),
                ("agent_scratchpad", scratchpad),
            ],
        )
    }

    async fn run(&self, input: &str) -> Result<String, AgentError> {
        let chat_history = render_transcript(&self.memory.get_context());
        let mut scratchpad = String::new();

        for iteration in 1..=self.max_iterations {
            let prompt = self.render_prompt(input, &chat_history, &scratchpad);
            let messages = vec![Message::system(self.persona.clone()), Message::user(prompt)];
            let response = self.llm.generate(messages, None).await?;
            let output = response.content.unwrap_or_default();

            let observation = match self.parser.parse(&output) {
                Ok(ReactStep::Finish(answer)) => {
                    log::info!("{} finished after {} iteration(s)", self.name, iteration);
                    return Ok(answer);
                }
                Ok(ReactStep::Action { tool, input }) => {
                    log::debug!("Iteration {}: action {} with input {}", iteration, tool, input);
                    self.tools.dispatch(&tool, input).await
                }
                Err(AgentError::ParsingError(message)) => {
                    log::warn!("Iteration {}: {}", iteration, message);
                    message
                }
                Err(e) => return Err(e),
            };

            scratchpad.push_str(&format!("{}\nObservation: {}\nThought: ", output, observation));
        }

        log::warn!("{} stopped after {} iterations", self.name, self.max_iterations);
        Err(AgentError::MaxStepsReached(self.max_iterations))
    }
}

#[async_trait]
impl ChatAgent for ReactAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError> {
        let answer = self.run(message).await?;
        self.memory.add_message(Message::user(message)).await?;
        self.memory.add_message(Message::assistant(answer.clone())).await?;
        Ok(answer)
    }

    async fn clear_chat(&mut self) -> Result<bool, AgentError> {
        self.memory.clear();
        Ok(true)
    }
}
