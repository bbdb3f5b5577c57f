//! In-process HTTP server that replays canned JSON responses.
//!
//! Routes are keyed by `"METHOD /path"`; each key owns a queue of responses
//! popped in order. Every request is recorded so tests can assert on the
//! exact wire traffic a REST client produced.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Value,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_lowercase()).cloned()
    }

    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Clone)]
struct MockServerState {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn replay_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let key = format!("{} {}", method, path);

    let body_json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    let recorded_headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    log::debug!("Mock server received {}", key);
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path,
        query: uri.query().map(|q| q.to_string()),
        headers: recorded_headers,
        body: body_json,
    });

    let next = state
        .routes
        .lock()
        .unwrap()
        .get_mut(&key)
        .and_then(|queue| queue.pop_front());

    match next {
        Some(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
            (status, Json(response.body)).into_response()
        }
        None => {
            log::error!("Mock server has no response queued for {}", key);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": format!("no response queued for {}", key)})),
            )
                .into_response()
        }
    }
}

pub struct MockHttpServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    routes: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    pub recorded_requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpServer {
    pub async fn start(routes: Vec<(&str, Vec<MockResponse>)>) -> Self {
        let routes: HashMap<String, VecDeque<MockResponse>> = routes
            .into_iter()
            .map(|(key, responses)| (key.to_string(), VecDeque::from(responses)))
            .collect();

        let state = MockServerState {
            routes: Arc::new(Mutex::new(routes)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let routes = state.routes.clone();
        let recorded_requests = state.requests.clone();

        let app = Router::new().fallback(replay_handler).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock HTTP server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock HTTP server error: {}", e));
        });

        MockHttpServer {
            addr,
            shutdown_tx,
            routes,
            recorded_requests,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue another response for `key` after the server has started.
    pub fn push_response(&self, key: &str, response: MockResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock HTTP server shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, key: &str) -> Vec<RecordedRequest> {
        self.get_requests()
            .into_iter()
            .filter(|request| request.route() == key)
            .collect()
    }
}
