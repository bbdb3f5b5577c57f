//! Role-playing crew adapter
//!
//! A single crew member (role, goal, backstory) works one task per turn. The
//! task description embeds the conversation so far and the user's query; the
//! member executes it with the shared tool-calling executor.

use async_trait::async_trait;
use std::sync::Arc;

use crate::agents::{ChatAgent, ToolCallingExecutor};
use crate::config::ParleyConfig;
use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::{create_llm_client, LLM};
use crate::memory::{render_transcript, ChatHistory, ConversationMemory};
use crate::prompts::{self, CREW_EXPECTED_OUTPUT, CREW_TASK};
use crate::tools::{ToolFactory, ToolRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct CrewMember {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl CrewMember {
    pub fn from_config(config: &ParleyConfig) -> Self {
        let prompts = &config.prompts;
        Self {
            role: prompts.role().to_string(),
            goal: format!("{}\n{}", prompts.goal(), prompts.instructions()),
            backstory: prompts.knowledge().to_string(),
        }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewTask {
    pub description: String,
    pub expected_output: String,
}

impl Default for CrewTask {
    fn default() -> Self {
        Self {
            description: CREW_TASK.to_string(),
            expected_output: CREW_EXPECTED_OUTPUT.to_string(),
        }
    }
}

impl CrewTask {
    pub fn render(&self, history: &str, query: &str) -> String {
        let description = prompts::render(&self.description, &[("history", history), ("query", query)]);
        format!(
            "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\nyou MUST return the actual complete content as the final answer, not a summary.",
            description, self.expected_output
        )
    }
}

pub struct Crew {
    member: CrewMember,
    task: CrewTask,
    executor: ToolCallingExecutor,
    kickoffs: usize,
}

impl Crew {
    pub fn new(member: CrewMember, task: CrewTask, executor: ToolCallingExecutor) -> Self {
        Self {
            member,
            task,
            executor,
            kickoffs: 0,
        }
    }

    pub fn kickoffs(&self) -> usize {
        self.kickoffs
    }

    pub async fn kickoff(&mut self, query: &str, history: &str) -> Result<String, AgentError> {
        self.kickoffs += 1;
        let messages = vec![
            Message::system(self.member.system_prompt()),
            Message::user(self.task.render(history, query)),
        ];
        let outcome = self.executor.run(messages).await?;
        log::info!(
            "Crew task finished in {} step(s) (kickoff {})",
            outcome.steps,
            self.kickoffs
        );
        Ok(outcome.reply)
    }
}

pub struct CrewAgent {
    name: String,
    member: CrewMember,
    task: CrewTask,
    executor: ToolCallingExecutor,
    crew: Crew,
    history: ChatHistory,
}

impl CrewAgent {
    pub fn new(
        name: impl Into<String>,
        member: CrewMember,
        llm: Arc<dyn LLM>,
        tools: ToolRegistry,
        max_steps: usize,
    ) -> Self {
        let task = CrewTask::default();
        let executor = ToolCallingExecutor::new(llm, tools, max_steps);
        let crew = Crew::new(member.clone(), task.clone(), executor.clone());
        Self {
            name: name.into(),
            member,
            task,
            executor,
            crew,
            history: ChatHistory::new(),
        }
    }

    pub fn from_config(config: &ParleyConfig) -> Result<Self, AgentError> {
        let llm = create_llm_client(&config.llm)?;
        let tools = ToolFactory::create_default_registry(&config.tools);
        Ok(Self::new(
            config.agent.name.clone(),
            CrewMember::from_config(config),
            llm,
            tools,
            config.agent.max_steps,
        ))
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn crew(&self) -> &Crew {
        &self.crew
    }
}

#[async_trait]
impl ChatAgent for CrewAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError> {
        let transcript = render_transcript(self.history.messages());
        let reply = self.crew.kickoff(message, &transcript).await?;

        self.history.add_message(Message::user(message)).await?;
        self.history.add_message(Message::assistant(reply.clone())).await?;
        Ok(reply)
    }

    async fn clear_chat(&mut self) -> Result<bool, AgentError> {
        self.history.clear();
        self.crew = Crew::new(self.member.clone(), self.task.clone(), self.executor.clone());
        Ok(true)
    }
}
