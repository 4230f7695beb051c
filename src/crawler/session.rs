//! Page-fetching capability
//!
//! The scraper talks to a [`SiteSession`]: one logical browsing context that
//! holds the injected credentials and hands out short-lived pages. Each page is
//! navigated, given a chance to settle, read, and closed.
//!
//! [`HttpSession`] is the built-in implementation on top of `reqwest`. It does
//! not execute JavaScript, so a page is quiescent as soon as its body has been
//! read.

use crate::auth::CookieJar;
use crate::crawler::parser::extract_title;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while fetching or reading a single page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Navigation to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Network did not settle within {0:?}")]
    QuiescenceTimeout(Duration),

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Page has not been navigated yet")]
    NotLoaded,

    #[error("Failed to convert page content: {0}")]
    Conversion(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A shared browsing context that opens pages
#[async_trait]
pub trait SiteSession: Send + Sync {
    /// Opens a new page within this session
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, FetchError>;
}

/// A single open page
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigates to `url`, failing if it takes longer than `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Waits until the page stops issuing network requests
    async fn wait_for_quiescence(&mut self, timeout: Duration) -> Result<(), FetchError>;

    /// The rendered page title
    async fn title(&self) -> Result<String, FetchError>;

    /// The rendered page HTML
    async fn content(&self) -> Result<String, FetchError>;

    /// Closes the page and releases its resources
    async fn close(self: Box<Self>);
}

/// Upper bound on any single request made through [`build_http_client`]
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client shared by every page in a session
///
/// Redirects are followed (SSO bounces land on the login page, which the
/// loader detects by content), and cookies are attached per request.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Title reported for any page served with HTTP 404
const NOT_FOUND_TITLE: &str = "404 Page Not Found";

/// A `reqwest`-backed session carrying the wiki cookies
pub struct HttpSession {
    client: Client,
    cookies: Arc<CookieJar>,
}

impl HttpSession {
    /// Creates a session that sends `cookies` with every page request
    pub fn new(cookies: CookieJar, user_agent: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(user_agent)?,
            cookies: Arc::new(cookies),
        })
    }
}

#[async_trait]
impl SiteSession for HttpSession {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, FetchError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            cookies: Arc::clone(&self.cookies),
            loaded: None,
        }))
    }
}

struct LoadedPage {
    status: StatusCode,
    body: String,
}

struct HttpPage {
    client: Client,
    cookies: Arc<CookieJar>,
    loaded: Option<LoadedPage>,
}

impl HttpPage {
    fn loaded(&self) -> Result<&LoadedPage, FetchError> {
        self.loaded.as_ref().ok_or(FetchError::NotLoaded)
    }
}

#[async_trait]
impl PageHandle for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut request = self.client.get(parsed.clone());
        if let Some(host) = parsed.host_str() {
            let header = self.cookies.as_header(host);
            if !header.is_empty() {
                request = request.header(COOKIE, header);
            }
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let load = async move {
            let response = request.send().await.map_err(classify)?;
            let status = response.status();

            // A 404 still renders a page (the wiki shows its own not-found view)
            if !status.is_success() && status != StatusCode::NOT_FOUND {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.text().await.map_err(classify)?;
            Ok(LoadedPage { status, body })
        };

        let page = tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            })??;

        tracing::trace!("Loaded {} ({}, {} bytes)", url, page.status, page.body.len());
        self.loaded = Some(page);
        Ok(())
    }

    async fn wait_for_quiescence(&mut self, _timeout: Duration) -> Result<(), FetchError> {
        self.loaded().map(|_| ())
    }

    async fn title(&self) -> Result<String, FetchError> {
        let page = self.loaded()?;
        // The wiki's not-found view carries the normal site title
        if page.status == StatusCode::NOT_FOUND {
            return Ok(NOT_FOUND_TITLE.to_string());
        }
        Ok(extract_title(&page.body).unwrap_or_default())
    }

    async fn content(&self) -> Result<String, FetchError> {
        Ok(self.loaded()?.body.clone())
    }

    async fn close(self: Box<Self>) {}
}
