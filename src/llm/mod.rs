//! Model capabilities used by the index and the agent graphs
//!
//! Two capabilities are injected everywhere a model is needed:
//! - [`TextCompletion`]: one system + user prompt in, one text answer out
//! - [`Embedder`]: a batch of texts in, one vector per text out
//!
//! The HTTP implementations speak the OpenAI chat/embeddings API and the
//! Anthropic messages API. Clients are built once per run and passed down.

mod anthropic;
mod openai;

pub use anthropic::AnthropicChat;
pub use openai::{OpenAiChat, OpenAiEmbeddings};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to every model request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised by model clients
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key or invalid client settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the provider
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<crate::ConfigError> for LlmError {
    fn from(err: crate::ConfigError) -> Self {
        LlmError::Config(err.to_string())
    }
}

/// Result type for model operations
pub type LlmResult<T> = Result<T, LlmError>;

/// A chat model that answers a single prompt
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Completes `prompt` under `system`
    ///
    /// `node` names the graph node making the call and is only used for logging.
    async fn complete(&self, node: &str, system: &str, prompt: &str) -> LlmResult<String>;
}

/// A model that maps texts to embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds every text, returning vectors in input order
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;
}

fn build_client() -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {}", e)))
}

fn network_error(provider: &str, err: reqwest::Error) -> LlmError {
    LlmError::Network(format!("failed to call {}: {}", provider, err))
}

/// Reads the body of a failed response into an `Api` error
async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    LlmError::Api { status, body }
}
