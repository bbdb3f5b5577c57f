//! State-graph adapter
//!
//! A small state machine runtime: named nodes transform a shared state, static
//! and conditional edges pick the next node, and execution stops at [`END`].
//! The prebuilt ReAct graph alternates an `agent` node (one LLM call) and a
//! `tools` node (every tool call from the last assistant message) and keeps
//! per-thread message state in a [`MemorySaver`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::ChatAgent;
use crate::config::ParleyConfig;
use crate::core_types::{Message, Role};
use crate::errors::AgentError;
use crate::llm::{create_llm_client, ToolMetadata, LLM};
use crate::tools::{ToolFactory, ToolRegistry};

pub const START: &str = "__start__";
pub const END: &str = "__end__";

pub const DEFAULT_RECURSION_LIMIT: usize = 25;

#[async_trait]
pub trait Node<S: Send + 'static>: Send + Sync {
    async fn run(&self, state: S) -> Result<S, AgentError>;
}

/// Picks the next node from the current state.
pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional(Router<S>),
}

impl<S> Clone for Edge<S> {
    fn clone(&self) -> Self {
        match self {
            Edge::Direct(target) => Edge::Direct(target.clone()),
            Edge::Conditional(router) => Edge::Conditional(router.clone()),
        }
    }
}

fn graph_error(message: impl Into<String>) -> AgentError {
    AgentError::GraphError(message.into())
}

pub struct StateGraph<S: Send + 'static> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
}

impl<S: Send + 'static> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, name: &str, node: Arc<dyn Node<S>>) -> Result<&mut Self, AgentError> {
        if name == START || name == END {
            return Err(graph_error(format!("'{}' is a reserved node name", name)));
        }
        if self.nodes.contains_key(name) {
            return Err(graph_error(format!("Node '{}' already present", name)));
        }
        self.nodes.insert(name.to_string(), node);
        Ok(self)
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<&mut Self, AgentError> {
        self.insert_edge(from, Edge::Direct(to.to_string()))
    }

    pub fn add_conditional_edges(&mut self, from: &str, router: Router<S>) -> Result<&mut Self, AgentError> {
        self.insert_edge(from, Edge::Conditional(router))
    }

    pub fn set_entry_point(&mut self, name: &str) -> Result<&mut Self, AgentError> {
        self.add_edge(START, name)
    }

    fn insert_edge(&mut self, from: &str, edge: Edge<S>) -> Result<&mut Self, AgentError> {
        if from == END {
            return Err(graph_error("END cannot have outgoing edges"));
        }
        if self.edges.contains_key(from) {
            return Err(graph_error(format!("Node '{}' already has an outgoing edge", from)));
        }
        self.edges.insert(from.to_string(), edge);
        Ok(self)
    }

    pub fn compile(&self) -> Result<CompiledGraph<S>, AgentError> {
        match self.edges.get(START) {
            Some(Edge::Direct(entry)) if self.nodes.contains_key(entry) => {}
            Some(Edge::Direct(entry)) => {
                return Err(graph_error(format!("Entry point '{}' is not a node", entry)))
            }
            Some(Edge::Conditional(_)) => {
                return Err(graph_error("Entry point must be a static edge"))
            }
            None => return Err(graph_error("Graph must have an entry point")),
        }

        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(graph_error(format!("Node '{}' has no outgoing edge", name)));
            }
        }

        for (from, edge) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(graph_error(format!("Edge starts at unknown node '{}'", from)));
            }
            if let Edge::Direct(to) = edge {
                if to != END && !self.nodes.contains_key(to) {
                    return Err(graph_error(format!("Edge '{}' -> '{}' targets unknown node", from, to)));
                }
            }
        }

        Ok(CompiledGraph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        })
    }
}

impl<S: Send + 'static> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CompiledGraph<S: Send + 'static> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
}

impl<S: Send + 'static> CompiledGraph<S> {
    fn next(&self, from: &str, state: &S) -> Result<String, AgentError> {
        let target = match self.edges.get(from) {
            Some(Edge::Direct(to)) => to.clone(),
            Some(Edge::Conditional(router)) => router(state),
            None => return Err(graph_error(format!("Node '{}' has no outgoing edge", from))),
        };
        if target != END && !self.nodes.contains_key(&target) {
            return Err(graph_error(format!("'{}' routed to unknown node '{}'", from, target)));
        }
        Ok(target)
    }

    /// Run from the entry point until `END`, executing at most `recursion_limit` nodes.
    pub async fn invoke(&self, mut state: S, recursion_limit: usize) -> Result<S, AgentError> {
        let mut current = self.next(START, &state)?;
        let mut steps = 0;

        while current != END {
            if steps >= recursion_limit {
                return Err(graph_error(format!(
                    "Recursion limit of {} reached without hitting a stop condition",
                    recursion_limit
                )));
            }
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| graph_error(format!("Unknown node '{}'", current)))?;

            log::debug!("Graph step {}: {}", steps + 1, current);
            state = node.run(state).await?;
            steps += 1;
            current = self.next(&current, &state)?;
        }

        Ok(state)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagesState {
    pub messages: Vec<Message>,
}

impl MessagesState {
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// In-memory checkpoints of message state, keyed by thread id.
#[derive(Debug, Default)]
pub struct MemorySaver {
    checkpoints: HashMap<String, MessagesState>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> Option<&MessagesState> {
        self.checkpoints.get(thread_id)
    }

    pub fn put(&mut self, thread_id: &str, state: MessagesState) {
        self.checkpoints.insert(thread_id.to_string(), state);
    }

    pub fn remove(&mut self, thread_id: &str) -> Option<MessagesState> {
        self.checkpoints.remove(thread_id)
    }

    pub fn thread_count(&self) -> usize {
        self.checkpoints.len()
    }
}

struct AgentNode {
    llm: Arc<dyn LLM>,
    system_prompt: String,
    tools: Option<Vec<ToolMetadata>>,
}

#[async_trait]
impl Node<MessagesState> for AgentNode {
    async fn run(&self, mut state: MessagesState) -> Result<MessagesState, AgentError> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(state.messages.iter().cloned());

        let response = self.llm.generate(messages, self.tools.clone()).await?;
        let content = response.content.unwrap_or_default();
        let message = match response.tool_calls {
            Some(calls) if !calls.is_empty() => Message::assistant_with_tools(content, calls),
            _ => Message::assistant(content),
        };
        state.messages.push(message);
        Ok(state)
    }
}

struct ToolsNode {
    tools: ToolRegistry,
}

#[async_trait]
impl Node<MessagesState> for ToolsNode {
    async fn run(&self, mut state: MessagesState) -> Result<MessagesState, AgentError> {
        let calls = state
            .last()
            .and_then(|message| message.tool_calls.clone())
            .unwrap_or_default();

        for call in calls {
            let output = self.tools.dispatch_call(&call).await;
            state.messages.push(Message::tool_result(call.id, output));
        }
        Ok(state)
    }
}

/// The `agent ⇄ tools` loop: the agent node runs first and hands over to
/// `tools` whenever its last message requests tool calls.
pub fn create_react_graph(
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    system_prompt: impl Into<String>,
) -> Result<CompiledGraph<MessagesState>, AgentError> {
    let definitions = if tools.is_empty() { None } else { Some(tools.list_tools()) };

    let mut graph: StateGraph<MessagesState> = StateGraph::new();
    graph.add_node(
        "agent",
        Arc::new(AgentNode {
            llm,
            system_prompt: system_prompt.into(),
            tools: definitions,
        }),
    )?;
    graph.add_node("tools", Arc::new(ToolsNode { tools }))?;
    graph.set_entry_point("agent")?;
    graph.add_conditional_edges(
        "agent",
        Arc::new(|state: &MessagesState| {
            if state.last().is_some_and(|message| message.has_tool_calls()) {
                "tools".to_string()
            } else {
                END.to_string()
            }
        }),
    )?;
    graph.add_edge("tools", "agent")?;
    graph.compile()
}

pub struct GraphAgent {
    name: String,
    graph: CompiledGraph<MessagesState>,
    checkpointer: MemorySaver,
    thread_id: u64,
    recursion_limit: usize,
}

impl GraphAgent {
    pub fn new(name: impl Into<String>, graph: CompiledGraph<MessagesState>) -> Self {
        Self {
            name: name.into(),
            graph,
            checkpointer: MemorySaver::new(),
            thread_id: 1,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit.max(1);
        self
    }

    pub fn from_config(config: &ParleyConfig) -> Result<Self, AgentError> {
        let llm = create_llm_client(&config.llm)?;
        let tools = ToolFactory::create_default_registry(&config.tools);
        let graph = create_react_graph(llm, tools, config.prompts.system_prompt())?;
        Ok(Self::new(config.agent.name.clone(), graph))
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn checkpoint(&self) -> Option<&MessagesState> {
        self.checkpointer.get(&self.thread_id.to_string())
    }

    pub fn checkpointer(&self) -> &MemorySaver {
        &self.checkpointer
    }
}

#[async_trait]
impl ChatAgent for GraphAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError> {
        let thread = self.thread_id.to_string();
        let mut state = self.checkpointer.get(&thread).cloned().unwrap_or_default();
        state.messages.push(Message::user(message));

        let state = self.graph.invoke(state, self.recursion_limit).await?;
        let reply = state
            .last()
            .filter(|message| message.role == Role::Assistant)
            .map(|message| message.content.clone())
            .filter(|content| !content.is_empty())
            .ok_or(AgentError::EmptyReply)?;

        self.checkpointer.put(&thread, state);
        Ok(reply)
    }

    async fn clear_chat(&mut self) -> Result<bool, AgentError> {
        self.checkpointer.remove(&self.thread_id.to_string());
        self.thread_id += 1;
        log::info!("{} switched to thread {}", self.name, self.thread_id);
        Ok(true)
    }
}
