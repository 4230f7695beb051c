//! wiki-bot: A retrieval-augmented question answering bot for a private wiki
//!
//! This crate crawls a Wiki.js site that sits behind single sign-on, indexes the
//! scraped pages for similarity search, and answers questions over them with an
//! LLM. It also carries two small agent graphs (a feeling interpreter and a
//! self-healing code fixer) that share the same completion capability.

pub mod agents;
pub mod auth;
pub mod config;
pub mod crawler;
pub mod index;
pub mod llm;
pub mod output;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wiki-bot operations
#[derive(Debug, Error)]
pub enum WikiBotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("LLM error: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Agent error: {0}")]
    Agent(#[from] agents::AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

/// Errors raised while enumerating, loading, or scraping the wiki
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Wiki API rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Wiki API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Page fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Authentication failed after {attempts} attempts (login page detected)")]
    AuthExhausted { attempts: u32 },

    #[error("No cookies found at {}; run `wiki-bot login` first", .0.display())]
    MissingCredentials(PathBuf),

    #[error("Credential refresh failed: {0}")]
    Auth(#[from] auth::AuthError),
}

/// Result type alias for wiki-bot operations
pub type Result<T> = std::result::Result<T, WikiBotError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for crawl operations
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use auth::{Cookie, CookieJar, CredentialStore};
pub use config::Config;
pub use crawler::{Document, PageRef};
pub use state::PageOutcome;
