//! Document loading with a credential refresh
//!
//! Expired cookies are not reported by the wiki as an error: the pages simply
//! render the sign-in view, or the API returns nothing. The loader treats any
//! of these as an authentication failure, runs the login again, and retries
//! up to a configured number of times. Every other error propagates at once.

use crate::auth::{Authenticator, CookieJar, CredentialStore};
use crate::config::{Config, WikiConfig};
use crate::crawler::{ConcurrentScraper, Document, HttpSession, PathEnumerator};
use crate::state::LoadState;
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use std::time::Duration;

/// Produces the full document set for a credential set
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load(&self, cookies: &CookieJar) -> CrawlResult<Vec<Document>>;
}

/// Enumerates the wiki and scrapes every page it lists
pub struct WikiSource {
    enumerator: PathEnumerator,
    scraper: ConcurrentScraper,
    user_agent: String,
}

impl WikiSource {
    pub fn new(enumerator: PathEnumerator, scraper: ConcurrentScraper, user_agent: &str) -> Self {
        Self {
            enumerator,
            scraper,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> CrawlResult<Self> {
        Ok(Self::new(
            PathEnumerator::new(&config.wiki.base_url, &config.wiki.user_agent)?
                .with_timeout(Duration::from_millis(config.crawler.navigation_timeout_ms)),
            ConcurrentScraper::from_config(&config.crawler)?,
            &config.wiki.user_agent,
        ))
    }
}

#[async_trait]
impl DocumentSource for WikiSource {
    async fn load(&self, cookies: &CookieJar) -> CrawlResult<Vec<Document>> {
        let pages = self.enumerator.list_pages(cookies).await?;
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let session = HttpSession::new(cookies.clone(), &self.user_agent)?;
        let urls: Vec<String> = pages.into_iter().map(|p| p.url).collect();
        let report = self.scraper.scrape(&session, &urls).await;

        Ok(report.documents)
    }
}

/// What to do when no cookie file exists before the first attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCookies {
    /// Run the authenticator once (not counted as a refresh)
    Login,

    /// Fail with `CrawlError::MissingCredentials`
    Fail,
}

/// Runs a document source, refreshing credentials on the login wall
pub struct LoaderWithRetry<'a> {
    source: &'a dyn DocumentSource,
    authenticator: &'a dyn Authenticator,
    store: &'a CredentialStore,
    max_retries: u32,
    sign_in_marker: String,
    missing: MissingCookies,
}

impl<'a> LoaderWithRetry<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        authenticator: &'a dyn Authenticator,
        store: &'a CredentialStore,
    ) -> Self {
        Self {
            source,
            authenticator,
            store,
            max_retries: 1,
            sign_in_marker: WikiConfig::default().sign_in_marker,
            missing: MissingCookies::Login,
        }
    }

    /// Sets how many credential refreshes are allowed
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sign_in_marker(mut self, marker: &str) -> Self {
        self.sign_in_marker = marker.to_string();
        self
    }

    pub fn on_missing_cookies(mut self, missing: MissingCookies) -> Self {
        self.missing = missing;
        self
    }

    /// Loads documents, refreshing credentials after each authentication failure
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Document>)` - A non-empty document set
    /// * `Err(CrawlError::AuthExhausted)` - Still unauthenticated after the last refresh
    /// * `Err(CrawlError)` - Any other failure, without retry
    pub async fn load(&self) -> CrawlResult<Vec<Document>> {
        let mut cookies = self.initial_cookies().await?;
        let mut state = LoadState::Attempt(0);

        loop {
            match state {
                LoadState::Attempt(k) => {
                    tracing::info!("Loading wiki documents ({})", state);

                    match self.source.load(&cookies).await {
                        Ok(documents) if !self.is_login_wall(&documents) => {
                            tracing::info!("Loaded {} documents", documents.len());
                            return Ok(documents);
                        }
                        Ok(documents) if documents.is_empty() => {
                            tracing::warn!("No documents loaded; credentials are likely expired");
                        }
                        Ok(_) => {
                            tracing::warn!("Sign-in page detected; credentials are likely expired");
                        }
                        Err(CrawlError::Unauthorized { status }) => {
                            tracing::warn!("Wiki API rejected credentials (HTTP {})", status);
                        }
                        Err(e) => return Err(e),
                    }

                    if k >= self.max_retries {
                        tracing::error!("Authentication failed after {} attempts", k + 1);
                        return Err(CrawlError::AuthExhausted { attempts: k + 1 });
                    }
                    state = LoadState::RefreshAuth(k + 1);
                }
                LoadState::RefreshAuth(k) => {
                    tracing::info!("Refreshing credentials ({})", state);
                    cookies = self.login_and_save().await?;
                    state = LoadState::Attempt(k);
                }
            }
        }
    }

    async fn initial_cookies(&self) -> CrawlResult<CookieJar> {
        if self.store.exists() {
            return Ok(self.store.load()?);
        }

        match self.missing {
            MissingCookies::Login => {
                tracing::info!(
                    "No cookie file at {}; logging in",
                    self.store.path().display()
                );
                self.login_and_save().await
            }
            MissingCookies::Fail => Err(CrawlError::MissingCredentials(
                self.store.path().to_path_buf(),
            )),
        }
    }

    async fn login_and_save(&self) -> CrawlResult<CookieJar> {
        let cookies = self.authenticator.login().await?;
        self.store.save(&cookies)?;
        Ok(cookies)
    }

    /// An empty result, or a sign-in page among the documents
    ///
    /// Document order follows completion order, so every document is checked
    /// rather than only the first.
    fn is_login_wall(&self, documents: &[Document]) -> bool {
        documents.is_empty()
            || documents
                .iter()
                .any(|d| d.content.contains(&self.sign_in_marker))
    }
}
