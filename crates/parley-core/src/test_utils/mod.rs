//! Helpers shared by unit tests.

pub mod mock_http_server;
pub mod mock_llm;

pub use mock_http_server::{MockHttpServer, MockResponse, RecordedRequest};
pub use mock_llm::{MockLLM, RecordedCall};
