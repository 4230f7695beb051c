//! Agent graphs
//!
//! Each graph is an enumerated state, a context it mutates, and a transition
//! function deciding the next state from the context. A runner executes the
//! node for the current state, applies the transition, and stops at `Done`.
//!
//! - `qa`: answers a question from the wiki index
//! - `feeler`: interprets a feeling and iterates on an encouragement
//! - `resolver`: rewrites code until a test command passes

pub mod feeler;
pub mod qa;
pub mod resolver;

pub use feeler::{FeelerContext, FeelerGraph, FeelerState};
pub use qa::{Intent, QaContext, QaGraph, QaState};
pub use resolver::{ResolverContext, ResolverGraph, ResolverState};

use crate::index::IndexError;
use crate::llm::LlmError;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while running a graph
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval failed: {0}")]
    Index(#[from] IndexError),

    #[error("Could not parse {node} output: {message}")]
    Parse { node: &'static str, message: String },

    #[error("Test command failed to start: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for graph runs
pub type AgentResult<T> = Result<T, AgentError>;

/// Receives a notification each time a graph enters a node
pub trait Observer {
    fn on_node(&mut self, node: &str, status: &str);
}

pub(crate) fn notify(observer: &mut Option<&mut dyn Observer>, node: &str, status: &str) {
    tracing::debug!("[{}] {}", node, status);
    if let Some(observer) = observer.as_deref_mut() {
        observer.on_node(node, status);
    }
}

/// Removes a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json", "python") on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses model output as JSON, tolerating a code fence around it
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}
