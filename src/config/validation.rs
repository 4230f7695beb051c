use crate::config::types::{AgentsConfig, Config, CrawlerConfig, IndexConfig, WikiConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_wiki_config(&config.wiki)?;
    validate_crawler_config(&config.crawler)?;
    validate_index_config(&config.index)?;
    validate_agents_config(&config.agents)?;
    Ok(())
}

/// Validates the target wiki section
fn validate_wiki_config(config: &WikiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url has no host: '{}'",
            config.base_url
        )));
    }

    if config.cookie_file.is_empty() {
        return Err(ConfigError::Validation(
            "cookie-file cannot be empty".to_string(),
        ));
    }

    if config.sign_in_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sign-in-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates scraper configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages_open < 1 || config.max_concurrent_pages_open > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-pages-open must be between 1 and 100, got {}",
            config.max_concurrent_pages_open
        )));
    }

    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-ms must be > 0".to_string(),
        ));
    }

    if config.content_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "content-selectors must name at least one selector".to_string(),
        ));
    }

    for selector in config
        .content_selectors
        .iter()
        .chain(config.comment_selectors.iter())
    {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid CSS selector: '{}'",
                selector
            )));
        }
    }

    Ok(())
}

/// Validates index configuration
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "chunk-size must be > 0".to_string(),
        ));
    }

    if config.chunk_overlap >= config.chunk_size {
        return Err(ConfigError::Validation(format!(
            "chunk-overlap ({}) must be smaller than chunk-size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    if config.top_k == 0 {
        return Err(ConfigError::Validation("top-k must be >= 1".to_string()));
    }

    if config.embedding_batch_size == 0 {
        return Err(ConfigError::Validation(
            "embedding-batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_agents_config(config: &AgentsConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.score_threshold) {
        return Err(ConfigError::Validation(format!(
            "score-threshold must be between 0 and 1, got {}",
            config.score_threshold
        )));
    }

    if config.max_resolver_iterations == 0 {
        return Err(ConfigError::Validation(
            "max-resolver-iterations must be >= 1".to_string(),
        ));
    }

    Ok(())
}
