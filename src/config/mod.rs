//! Configuration module for wiki-bot
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! API keys never live in the file; they are read from the environment (and an
//! optional `.env` file) via [`api_key`].
//!
//! # Example
//!
//! ```no_run
//! use wiki_bot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("wiki-bot.toml")).unwrap();
//! println!("Crawling {}", config.wiki.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AgentsConfig, Config, CrawlerConfig, IndexConfig, LlmConfig, WikiConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

use crate::ConfigError;

/// Reads an API key from the environment, loading `.env` first if present
pub fn api_key(var: &str) -> Result<String, ConfigError> {
    let _ = dotenvy::dotenv();
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(var.to_string())),
    }
}
