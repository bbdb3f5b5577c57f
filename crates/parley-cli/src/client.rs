//! Chat backends for the terminal UI
//!
//! The UI talks either to an agent built in-process or to a running
//! `parley-server` over HTTP; both sit behind [`ChatClient`].

use anyhow::Result;
use async_trait::async_trait;
use parley_core::agents::ChatAgent;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

#[async_trait]
pub trait ChatClient: Send + Sync {
    fn name(&self) -> String;

    async fn health_check(&self) -> Result<()>;

    async fn send_message(&mut self, message: &str) -> Result<String>;

    async fn clear_chat(&mut self) -> Result<bool>;
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }

    async fn send_message(&mut self, message: &str) -> Result<String> {
        (**self).send_message(message).await
    }

    async fn clear_chat(&mut self) -> Result<bool> {
        (**self).clear_chat().await
    }
}

/// Drives an agent inside the CLI process.
pub struct LocalChatClient {
    agent: Box<dyn ChatAgent>,
}

impl LocalChatClient {
    pub fn new(agent: Box<dyn ChatAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ChatClient for LocalChatClient {
    fn name(&self) -> String {
        self.agent.name().to_string()
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&mut self, message: &str) -> Result<String> {
        Ok(self.agent.chat(message).await)
    }

    async fn clear_chat(&mut self) -> Result<bool> {
        Ok(self.agent.clear_chat().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// HTTP client for a remote `parley-server`.
pub struct RemoteChatClient {
    server_url: String,
    http_client: Client,
}

impl RemoteChatClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<Value>().await {
            Ok(body) => body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Server returned {}", status)),
            Err(_) => format!("Server returned {}", status),
        }
    }
}

#[async_trait]
impl ChatClient for RemoteChatClient {
    fn name(&self) -> String {
        format!("remote agent at {}", self.server_url)
    }

    async fn health_check(&self) -> Result<()> {
        let health_url = format!("{}/health", self.server_url);
        let response = self.http_client.get(&health_url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            anyhow::bail!("Server health check failed: {}", response.status())
        }
    }

    async fn send_message(&mut self, message: &str) -> Result<String> {
        let chat_url = format!("{}/api/chat", self.server_url);
        let response = self
            .http_client
            .post(&chat_url)
            .json(&json!({"message": message}))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("{}", Self::error_message(response).await);
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply.content)
    }

    async fn clear_chat(&mut self) -> Result<bool> {
        let clear_url = format!("{}/api/clear_chat", self.server_url);
        let response = self.http_client.post(&clear_url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Clear chat request failed: {}", Self::error_message(response).await);
        }
        Ok(response.json::<bool>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::errors::AgentError;
    use parley_server::{ChatServer, ServerConfig};
    use std::net::SocketAddr;

    struct CountingAgent {
        turns: usize,
        fail: bool,
    }

    #[async_trait]
    impl ChatAgent for CountingAgent {
        fn name(&self) -> &str {
            "Counting Agent"
        }

        async fn try_chat(&mut self, message: &str) -> std::result::Result<String, AgentError> {
            if self.fail {
                return Err(AgentError::MaxStepsReached(10));
            }
            self.turns += 1;
            Ok(format!("{}: {}", self.turns, message))
        }

        async fn clear_chat(&mut self) -> std::result::Result<bool, AgentError> {
            self.turns = 0;
            Ok(true)
        }
    }

    async fn spawn_server(fail: bool) -> String {
        let agent = CountingAgent { turns: 0, fail };
        let server = ChatServer::with_config(Box::new(agent), ServerConfig::default().with_logging(false));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve_listener(listener, std::future::pending()));
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_local_client_collapses_errors() {
        let mut client = LocalChatClient::new(Box::new(CountingAgent { turns: 0, fail: true }));
        assert_eq!(
            client.send_message("hi").await.unwrap(),
            parley_core::errors::APOLOGY
        );
        assert_eq!(client.name(), "Counting Agent");
    }

    #[tokio::test]
    async fn test_remote_client_round_trip() {
        let url = spawn_server(false).await;
        let mut client = RemoteChatClient::new(url);

        client.health_check().await.unwrap();
        assert_eq!(client.send_message("hello").await.unwrap(), "1: hello");
        assert_eq!(client.send_message("again").await.unwrap(), "2: again");
        assert!(client.clear_chat().await.unwrap());
        assert_eq!(client.send_message("fresh").await.unwrap(), "1: fresh");
    }

    #[tokio::test]
    async fn test_remote_client_surfaces_server_error() {
        let url = spawn_server(true).await;
        let mut client = RemoteChatClient::new(url);

        let error = client.send_message("hello").await.unwrap_err();
        assert_eq!(error.to_string(), "Maximum steps reached (10)");
    }
}
