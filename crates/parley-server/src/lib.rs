//! HTTP façade for a single Parley chat agent
//!
//! The server owns one agent instance for the lifetime of the process and
//! serialises access to it behind an async mutex:
//!
//! - `POST /api/chat` `{"message": "..."}` → `{"role": "assistant", "content": "..."}`
//! - `POST /api/clear_chat` → `true` once the conversation is reset
//! - `GET /health`

pub mod error;

pub use error::{Result, ServerError};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use parley_core::agents::ChatAgent;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Default bind address of the chat backend.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5556";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub role: String,
    pub content: String,
}

impl ChatResponse {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5556)),
            enable_cors: true,
            cors_origins: None,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address '{}': {}", addr, e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

pub type SharedAgent = Arc<Mutex<Box<dyn ChatAgent>>>;

/// Shared application state: the one agent every request talks to.
#[derive(Clone)]
pub struct AppState {
    pub agent: SharedAgent,
}

/// Pull a string `message` out of a request body; anything else is a 400.
fn extract_message(body: &[u8]) -> Result<String> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .ok_or_else(|| ServerError::missing_fields("message"))
}

/// Handler for the /api/chat POST endpoint.
async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<ChatResponse>, ServerError> {
    let message = extract_message(&body).map_err(|e| {
        log::warn!("Rejected chat request: {}", e);
        e
    })?;

    let mut agent = state.agent.lock().await;
    log::info!("{} received message ({} chars)", agent.name(), message.chars().count());

    match agent.try_chat(&message).await {
        Ok(reply) => Ok(Json(ChatResponse::assistant(reply))),
        Err(e) => {
            log::error!("{} failed to answer: {}", agent.name(), e);
            Err(e.into())
        }
    }
}

/// Handler for the /api/clear_chat POST endpoint.
async fn clear_chat_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<bool>, ServerError> {
    let mut agent = state.agent.lock().await;
    match agent.clear_chat().await {
        Ok(cleared) => {
            log::info!("{} conversation cleared: {}", agent.name(), cleared);
            Ok(Json(cleared))
        }
        Err(e) => {
            log::error!("Error clearing chat: {}", e);
            Err(e.into())
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn log_requests(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    if uri.path() == "/health" {
        log::debug!("Request {} {} {}", request_id, method, uri);
    } else {
        log::info!("Request {} {} {}", request_id, method, uri);
    }

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    log::info!(
        "Response {} {} in {:?}",
        request_id,
        response.status(),
        start.elapsed()
    );
    response
}

pub struct ChatServer {
    agent: SharedAgent,
    config: ServerConfig,
}

impl ChatServer {
    pub fn new(agent: Box<dyn ChatAgent>) -> Self {
        Self::with_config(agent, ServerConfig::default())
    }

    pub fn with_config(agent: Box<dyn ChatAgent>, config: ServerConfig) -> Self {
        Self {
            agent: Arc::new(Mutex::new(agent)),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle to the served agent.
    pub fn agent(&self) -> SharedAgent {
        self.agent.clone()
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            agent: self.agent.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/chat", post(chat_handler))
            .route("/api/clear_chat", post(clear_chat_handler))
            .fallback(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({"error": "Not found"})),
                )
            })
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(log_requests));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = match &self.config.cors_origins {
                Some(origins) => {
                    let origins: std::result::Result<Vec<_>, _> =
                        origins.iter().map(|s| s.parse()).collect();
                    match origins {
                        Ok(origins) => CorsLayer::new()
                            .allow_origin(origins)
                            .allow_methods(Any)
                            .allow_headers(Any),
                        Err(_) => CorsLayer::permissive(),
                    }
                }
                None => CorsLayer::permissive(),
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Bind the configured address and serve until `shutdown_signal` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;
        self.serve_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = listener.local_addr()?;

        log::info!("Parley server listening on {}", addr);
        log::info!("Chat endpoint: http://{}/api/chat", addr);
        log::info!("Clear endpoint: http://{}/api/clear_chat", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Parley server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
