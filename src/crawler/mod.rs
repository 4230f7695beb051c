//! Crawler module for turning the wiki into a list of documents
//!
//! This module contains the core crawling logic, including:
//! - Page enumeration through the GraphQL API
//! - A page-fetching session carrying the wiki cookies
//! - Concurrent scraping behind an admission gate
//! - HTML cleanup and markdown conversion
//! - Loading with a credential refresh when the login wall is hit

mod enumerator;
mod loader;
mod parser;
mod scraper;
mod session;

pub use enumerator::PathEnumerator;
pub use loader::{DocumentSource, LoaderWithRetry, MissingCookies, WikiSource};
pub use parser::{extract_title, html_to_markdown, is_not_found, ContentExtractor};
pub use scraper::{ConcurrentScraper, ScrapeReport, ScrapeSettings};
pub use session::{
    build_http_client, FetchError, HttpSession, PageHandle, SiteSession, DEFAULT_REQUEST_TIMEOUT,
};

use crate::auth::{Authenticator, CredentialStore};
use crate::config::Config;
use crate::CrawlResult;
use serde::{Deserialize, Serialize};

/// A page reference produced by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    /// Absolute page URL
    pub url: String,

    /// Page title as reported by the wiki
    pub title: String,
}

/// A scraped page, ready for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Markdown content, prefixed with the title and source URL
    pub content: String,

    /// URL the page was fetched from
    pub source: String,

    /// Rendered page title
    pub title: String,
}

impl Document {
    /// Builds a document from a rendered page
    pub fn from_page(url: &str, title: &str, markdown: &str) -> Self {
        Self {
            content: format!("# {}\nURL: {}\n\n{}", title, url, markdown),
            source: url.to_string(),
            title: title.to_string(),
        }
    }
}

/// Runs a complete crawl of the configured wiki
///
/// This is the main entry point for crawling. It will:
/// 1. Load the cookie file (or obtain cookies, per `missing`)
/// 2. Enumerate every page through the GraphQL API
/// 3. Scrape all pages concurrently
/// 4. Refresh credentials and retry if the login wall was hit
///
/// # Arguments
///
/// * `config` - The wiki-bot configuration
/// * `authenticator` - Used for the initial login and for refreshes
/// * `missing` - What to do when the cookie file does not exist
///
/// # Returns
///
/// * `Ok(Vec<Document>)` - The scraped documents (never empty)
/// * `Err(CrawlError)` - Crawl failed
pub async fn crawl(
    config: &Config,
    authenticator: &dyn Authenticator,
    missing: MissingCookies,
) -> CrawlResult<Vec<Document>> {
    let source = WikiSource::from_config(config)?;
    let store = CredentialStore::new(&config.wiki.cookie_file);

    LoaderWithRetry::new(&source, authenticator, &store)
        .with_max_retries(config.crawler.max_auth_retries)
        .with_sign_in_marker(&config.wiki.sign_in_marker)
        .on_missing_cookies(missing)
        .load()
        .await
}
