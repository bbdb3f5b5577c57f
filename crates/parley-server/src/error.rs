//! Error types for the Parley HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use parley_core::errors::AgentError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// The agent failed to produce a reply or reset its conversation
    #[error("{0}")]
    Agent(#[from] AgentError),

    /// Missing or malformed request fields
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn missing_fields(fields: impl Into<String>) -> Self {
        Self::MissingFields(fields.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::MissingFields(_) => StatusCode::BAD_REQUEST,
            ServerError::Agent(_)
            | ServerError::Io(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::missing_fields("message").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(AgentError::EmptyReply).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_fields_message() {
        assert_eq!(
            ServerError::missing_fields("message").to_string(),
            "Missing required fields: message"
        );
    }

    #[test]
    fn test_agent_error_is_passed_through() {
        let error = ServerError::from(AgentError::PollingExhausted(60));
        assert_eq!(error.to_string(), "Polling exceeded maximum attempts (60)");
    }
}
