//! Direct-API adapter over the OpenAI Assistants API
//!
//! Construction creates one remote assistant and one thread. A turn adds the
//! user message to the thread, starts a run and polls it. When the run pauses
//! in `requires_action`, every requested tool call is executed locally and all
//! outputs are submitted in a single call before polling resumes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::ChatAgent;
use crate::assistants::{
    AssistantSpec, AssistantsApi, OpenAIAssistantsClient, RunStatus, RunToolCall, ToolOutput,
};
use crate::config::ParleyConfig;
use crate::errors::AgentError;
use crate::tools::{ToolFactory, ToolRegistry};

#[derive(Debug, Clone)]
pub struct AssistantsOptions {
    pub name: String,
    pub assistant_name: String,
    pub model: String,
    pub instructions: String,
    pub max_polling_attempts: usize,
    pub polling_interval: Duration,
}

impl Default for AssistantsOptions {
    fn default() -> Self {
        Self {
            name: "OpenAI Agent".to_string(),
            assistant_name: "Web Search Assistant".to_string(),
            model: "gpt-4o-mini".to_string(),
            instructions: String::new(),
            max_polling_attempts: 60,
            polling_interval: Duration::from_secs(1),
        }
    }
}

impl AssistantsOptions {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            name: config.agent.name.clone(),
            assistant_name: config.assistants.assistant_name.clone(),
            model: config.llm.model_name(),
            instructions: config.prompts.system_prompt(),
            max_polling_attempts: config.assistants.max_polling_attempts,
            polling_interval: config.assistants.polling_interval(),
        }
    }
}

pub struct AssistantsAgent {
    api: Arc<dyn AssistantsApi>,
    tools: ToolRegistry,
    options: AssistantsOptions,
    assistant_id: String,
    thread_id: String,
}

impl AssistantsAgent {
    pub async fn new(
        api: Arc<dyn AssistantsApi>,
        tools: ToolRegistry,
        options: AssistantsOptions,
    ) -> Result<Self, AgentError> {
        let spec = AssistantSpec {
            name: options.assistant_name.clone(),
            instructions: options.instructions.clone(),
            model: options.model.clone(),
            tools: tools.list_tools(),
        };
        let assistant = api.create_assistant(&spec).await?;
        let thread = api.create_thread().await?;

        Ok(Self {
            api,
            tools,
            options,
            assistant_id: assistant.id,
            thread_id: thread.id,
        })
    }

    pub async fn from_config(config: &ParleyConfig) -> Result<Self, AgentError> {
        let api = Arc::new(OpenAIAssistantsClient::from_config(&config.llm)?);
        let tools = ToolFactory::create_default_registry(&config.tools);
        Self::new(api, tools, AssistantsOptions::from_config(config)).await
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// The remote conversation handle; replaced by `clear_chat`.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Execute every requested tool call, one output per call, in request order.
    async fn handle_tool_calls(&self, tool_calls: &[RunToolCall]) -> Vec<ToolOutput> {
        let mut tool_outputs = Vec::with_capacity(tool_calls.len());
        for tool_call in tool_calls {
            let output = self
                .tools
                .dispatch_raw(&tool_call.function.name, &tool_call.function.arguments)
                .await;
            tool_outputs.push(ToolOutput {
                tool_call_id: tool_call.id.clone(),
                output,
            });
        }
        tool_outputs
    }

    /// Poll `run_id` until it completes, fails, or the attempt budget runs out.
    pub async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<String, AgentError> {
        let mut attempts = 0;
        while attempts < self.options.max_polling_attempts {
            let run = self.api.retrieve_run(thread_id, run_id).await?;
            log::debug!("Run {} status: {} (attempt {})", run_id, run.status, attempts + 1);

            match run.status {
                RunStatus::Completed => {
                    let messages = self.api.list_messages(thread_id).await?;
                    return messages
                        .iter()
                        .find(|message| message.role == "assistant")
                        .and_then(|message| message.first_text())
                        .map(|text| text.to_string())
                        .ok_or(AgentError::EmptyReply);
                }
                RunStatus::RequiresAction => {
                    let tool_calls = run.pending_tool_calls();
                    if !tool_calls.is_empty() {
                        log::info!("Run {} requested {} tool call(s)", run_id, tool_calls.len());
                        let tool_outputs = self.handle_tool_calls(tool_calls).await;
                        self.api
                            .submit_tool_outputs(thread_id, run_id, &tool_outputs)
                            .await?;
                    }
                }
                status if status.is_failure() => {
                    if let Some(error) = &run.last_error {
                        log::error!(
                            "Run {} ended with status {}: {}",
                            run_id,
                            status,
                            error.message.as_deref().unwrap_or("no error message")
                        );
                    } else {
                        log::error!("Run {} ended with status {}", run_id, status);
                    }
                    return Err(AgentError::RunEnded(status));
                }
                _ => {}
            }

            tokio::time::sleep(self.options.polling_interval).await;
            attempts += 1;
        }

        log::error!("Polling exceeded maximum attempts for run {}", run_id);
        Err(AgentError::PollingExhausted(attempts))
    }
}

#[async_trait]
impl ChatAgent for AssistantsAgent {
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn try_chat(&mut self, message: &str) -> Result<String, AgentError> {
        self.api.add_message(&self.thread_id, "user", message).await?;
        let run = self
            .api
            .create_run(&self.thread_id, &self.assistant_id, None)
            .await?;
        log::info!("Started run {} on thread {}", run.id, self.thread_id);
        self.poll_run(&self.thread_id, &run.id).await
    }

    async fn clear_chat(&mut self) -> Result<bool, AgentError> {
        let thread = self.api.create_thread().await.map_err(|e| {
            log::error!("Error clearing chat: {}", e);
            e
        })?;
        log::info!("Replaced thread {} with {}", self.thread_id, thread.id);
        self.thread_id = thread.id;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistants::{Assistant, Run, Thread, ThreadMessage};
    use crate::errors::APOLOGY;
    use crate::llm::ToolMetadata;
    use crate::tools::{DateTool, FixedClock, Tool};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted Assistants backend: returns queued run states and records traffic.
    #[derive(Default)]
    struct MockAssistantsApi {
        runs: Mutex<VecDeque<Value>>,
        messages: Mutex<Vec<Value>>,
        threads_created: Mutex<usize>,
        retrieve_calls: Mutex<usize>,
        submitted: Mutex<Vec<Vec<ToolOutput>>>,
        added: Mutex<Vec<(String, String)>>,
        specs: Mutex<Vec<AssistantSpec>>,
        fail_thread_creation: Mutex<bool>,
    }

    impl MockAssistantsApi {
        fn with_runs(runs: Vec<Value>) -> Self {
            Self {
                runs: Mutex::new(VecDeque::from(runs)),
                ..Default::default()
            }
        }

        fn with_reply(self, text: &str) -> Self {
            self.messages.lock().unwrap().push(json!({
                "id": "msg_reply",
                "role": "assistant",
                "content": [{"type": "text", "text": {"value": text, "annotations": []}}]
            }));
            self
        }
    }

    #[async_trait]
    impl AssistantsApi for MockAssistantsApi {
        async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AgentError> {
            self.specs.lock().unwrap().push(spec.clone());
            Ok(Assistant { id: "asst_1".to_string() })
        }

        async fn create_thread(&self) -> Result<Thread, AgentError> {
            if *self.fail_thread_creation.lock().unwrap() {
                return Err(AgentError::LLMError("thread creation failed".to_string()));
            }
            let mut count = self.threads_created.lock().unwrap();
            *count += 1;
            Ok(Thread { id: format!("thread_{}", *count) })
        }

        async fn add_message(
            &self,
            thread_id: &str,
            _role: &str,
            content: &str,
        ) -> Result<ThreadMessage, AgentError> {
            self.added
                .lock()
                .unwrap()
                .push((thread_id.to_string(), content.to_string()));
            Ok(serde_json::from_value(json!({"id": "msg_user", "role": "user", "content": []}))?)
        }

        async fn create_run(
            &self,
            _thread_id: &str,
            _assistant_id: &str,
            _instructions: Option<&str>,
        ) -> Result<Run, AgentError> {
            Ok(serde_json::from_value(json!({"id": "run_1", "status": "queued"}))?)
        }

        async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
            *self.retrieve_calls.lock().unwrap() += 1;
            let next = self
                .runs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!({"id": run_id, "status": "in_progress"}));
            Ok(serde_json::from_value(next)?)
        }

        async fn submit_tool_outputs(
            &self,
            _thread_id: &str,
            run_id: &str,
            tool_outputs: &[ToolOutput],
        ) -> Result<Run, AgentError> {
            self.submitted.lock().unwrap().push(tool_outputs.to_vec());
            Ok(serde_json::from_value(json!({"id": run_id, "status": "queued"}))?)
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
            let messages = self.messages.lock().unwrap().clone();
            Ok(messages
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<_>, _>>()?)
        }
    }

    /// Counts invocations of a named tool.
    struct CountingTool {
        name: &'static str,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: self.name.to_string(),
                description: "counting tool".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            }
        }

        async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
            self.calls.lock().unwrap().push(arguments);
            Ok(format!("{} output", self.name))
        }
    }

    fn fast_options(max_polling_attempts: usize) -> AssistantsOptions {
        AssistantsOptions {
            max_polling_attempts,
            polling_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn requires_action(calls: Value) -> Value {
        json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {"tool_calls": calls}
            }
        })
    }

    async fn agent_with(
        api: Arc<MockAssistantsApi>,
        tools: ToolRegistry,
        max_polling_attempts: usize,
    ) -> AssistantsAgent {
        AssistantsAgent::new(api, tools, fast_options(max_polling_attempts))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_construction_registers_tools_and_creates_thread() {
        let api = Arc::new(MockAssistantsApi::default());
        let tools = ToolFactory::create_default_registry(&Default::default());
        let agent = agent_with(api.clone(), tools, 5).await;

        assert_eq!(agent.assistant_id(), "asst_1");
        assert_eq!(agent.thread_id(), "thread_1");

        let specs = api.specs.lock().unwrap();
        assert_eq!(specs[0].name, "Web Search Assistant");
        assert_eq!(specs[0].model, "gpt-4o-mini");
        let names: Vec<&str> = specs[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["date", "web_search"]);
    }

    #[tokio::test]
    async fn test_completed_run_returns_newest_assistant_text() {
        let api = Arc::new(
            MockAssistantsApi::with_runs(vec![
                json!({"id": "run_1", "status": "in_progress"}),
                json!({"id": "run_1", "status": "completed"}),
            ])
            .with_reply("Hello from the assistant"),
        );
        let mut agent = agent_with(api.clone(), ToolRegistry::new(), 5).await;

        assert_eq!(agent.chat("Hi").await, "Hello from the assistant");
        assert_eq!(
            api.added.lock().unwrap()[0],
            ("thread_1".to_string(), "Hi".to_string())
        );
        assert_eq!(*api.retrieve_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_each_requested_tool_runs_once_and_outputs_are_submitted_together() {
        let date_calls = Arc::new(Mutex::new(Vec::new()));
        let search_calls = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register_tool(Arc::new(CountingTool { name: "date", calls: date_calls.clone() }));
        tools.register_tool(Arc::new(CountingTool { name: "web_search", calls: search_calls.clone() }));

        let api = Arc::new(
            MockAssistantsApi::with_runs(vec![
                requires_action(json!([
                    {"id": "call_a", "type": "function", "function": {"name": "date", "arguments": ""}},
                    {"id": "call_b", "type": "function", "function": {"name": "web_search", "arguments": "{\"query\": \"rust news\"}"}}
                ])),
                json!({"id": "run_1", "status": "completed"}),
            ])
            .with_reply("Here is the news"),
        );
        let mut agent = agent_with(api.clone(), tools, 5).await;

        assert_eq!(agent.chat("What's new in Rust today?").await, "Here is the news");

        assert_eq!(date_calls.lock().unwrap().len(), 1);
        assert_eq!(date_calls.lock().unwrap()[0], json!({}));
        assert_eq!(search_calls.lock().unwrap().len(), 1);
        assert_eq!(search_calls.lock().unwrap()[0], json!({"query": "rust news"}));

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0],
            vec![
                ToolOutput { tool_call_id: "call_a".to_string(), output: "date output".to_string() },
                ToolOutput { tool_call_id: "call_b".to_string(), output: "web_search output".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_gets_unsupported_sentinel() {
        let api = Arc::new(
            MockAssistantsApi::with_runs(vec![
                requires_action(json!([
                    {"id": "call_x", "type": "function", "function": {"name": "calculator", "arguments": "{}"}}
                ])),
                json!({"id": "run_1", "status": "completed"}),
            ])
            .with_reply("ok"),
        );
        let mut agent = agent_with(api.clone(), ToolRegistry::new(), 5).await;
        agent.chat("2+2?").await;

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted[0][0].output, "Unsupported tool.");
        assert_eq!(submitted[0][0].tool_call_id, "call_x");
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_error_output() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register_tool(Arc::new(CountingTool { name: "web_search", calls: calls.clone() }));

        let api = Arc::new(
            MockAssistantsApi::with_runs(vec![
                requires_action(json!([
                    {"id": "call_1", "type": "function", "function": {"name": "web_search", "arguments": "{\"query\": "}}
                ])),
                json!({"id": "run_1", "status": "completed"}),
            ])
            .with_reply("recovered"),
        );
        let mut agent = agent_with(api.clone(), tools, 5).await;

        assert_eq!(agent.chat("search").await, "recovered");
        assert!(calls.lock().unwrap().is_empty());
        assert!(api.submitted.lock().unwrap()[0][0].output.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_date_tool_output_is_submitted() {
        let mut tools = ToolRegistry::new();
        tools.register_tool(Arc::new(DateTool::with_clock(Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        )))));

        let api = Arc::new(
            MockAssistantsApi::with_runs(vec![
                requires_action(json!([
                    {"id": "call_d", "type": "function", "function": {"name": "date", "arguments": "{}"}}
                ])),
                json!({"id": "run_1", "status": "completed"}),
            ])
            .with_reply("Today is October 16, 2026"),
        );
        let mut agent = agent_with(api.clone(), tools, 5).await;
        agent.chat("What's the date?").await;

        assert_eq!(api.submitted.lock().unwrap()[0][0].output, "October 16, 2026");
    }

    #[tokio::test]
    async fn test_terminal_failure_statuses_end_the_turn() {
        for status in ["failed", "cancelled", "expired", "incomplete"] {
            let api = Arc::new(MockAssistantsApi::with_runs(vec![json!({
                "id": "run_1",
                "status": status,
                "last_error": {"code": "server_error", "message": "something broke"}
            })]));
            let agent = agent_with(api.clone(), ToolRegistry::new(), 5).await;

            let result = agent.poll_run("thread_1", "run_1").await;
            assert!(matches!(result, Err(AgentError::RunEnded(s)) if s.as_str() == status));
            assert_eq!(*api.retrieve_calls.lock().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_polling_budget_exhaustion_is_a_failure_not_a_panic() {
        let api = Arc::new(MockAssistantsApi::with_runs(Vec::new()));
        let mut agent = agent_with(api.clone(), ToolRegistry::new(), 3).await;

        let result = agent.poll_run("thread_1", "run_1").await;
        assert!(matches!(result, Err(AgentError::PollingExhausted(3))));
        assert_eq!(*api.retrieve_calls.lock().unwrap(), 3);

        assert_eq!(agent.chat("anyone there?").await, APOLOGY);
    }

    #[tokio::test]
    async fn test_completed_without_assistant_message_is_empty_reply() {
        let api = Arc::new(MockAssistantsApi::with_runs(vec![json!({"id": "run_1", "status": "completed"})]));
        let agent = agent_with(api, ToolRegistry::new(), 3).await;

        let result = agent.poll_run("thread_1", "run_1").await;
        assert!(matches!(result, Err(AgentError::EmptyReply)));
    }

    #[tokio::test]
    async fn test_polling_waits_between_attempts() {
        let api = Arc::new(MockAssistantsApi::with_runs(Vec::new()));
        let options = AssistantsOptions {
            max_polling_attempts: 3,
            polling_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let agent = AssistantsAgent::new(api, ToolRegistry::new(), options).await.unwrap();

        let started = std::time::Instant::now();
        let _ = agent.poll_run("thread_1", "run_1").await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_clear_chat_replaces_thread() {
        let api = Arc::new(MockAssistantsApi::default());
        let mut agent = agent_with(api.clone(), ToolRegistry::new(), 3).await;
        assert_eq!(agent.thread_id(), "thread_1");

        assert!(agent.clear_chat().await.unwrap());
        assert_eq!(agent.thread_id(), "thread_2");
    }

    #[tokio::test]
    async fn test_clear_chat_failure_keeps_old_thread() {
        let api = Arc::new(MockAssistantsApi::default());
        let mut agent = agent_with(api.clone(), ToolRegistry::new(), 3).await;

        *api.fail_thread_creation.lock().unwrap() = true;
        assert!(agent.clear_chat().await.is_err());
        assert_eq!(agent.thread_id(), "thread_1");
    }
}
