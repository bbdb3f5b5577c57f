//! Agent factory for creating configured agents from ParleyConfig

use crate::agents::{
    AgentKind, AssistantsAgent, ChatAgent, CrewAgent, GraphAgent, ReactAgent, ToolCallingAgent,
};
use crate::config::ParleyConfig;
use crate::errors::AgentError;

/// Builds the adapter selected by `agent.kind`.
pub struct AgentFactory;

impl AgentFactory {
    pub async fn create(config: &ParleyConfig) -> Result<Box<dyn ChatAgent>, AgentError> {
        Self::create_kind(config, config.agent.kind).await
    }

    /// Build a specific adapter, ignoring `agent.kind`.
    pub async fn create_kind(
        config: &ParleyConfig,
        kind: AgentKind,
    ) -> Result<Box<dyn ChatAgent>, AgentError> {
        let mut config = config.clone();
        config.agent.kind = kind;
        config.validate()?;

        log::info!(
            "Creating {} agent '{}' with model {}",
            kind,
            config.agent.name,
            config.llm.model_name()
        );

        let agent: Box<dyn ChatAgent> = match kind {
            AgentKind::Assistants => Box::new(AssistantsAgent::from_config(&config).await?),
            AgentKind::ToolCalling => Box::new(ToolCallingAgent::from_config(&config)?),
            AgentKind::React => Box::new(ReactAgent::from_config(&config)?),
            AgentKind::Graph => Box::new(GraphAgent::from_config(&config)?),
            AgentKind::Crew => Box::new(CrewAgent::from_config(&config)?),
        };
        Ok(agent)
    }
}
