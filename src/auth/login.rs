//! Interactive login
//!
//! The wiki only accepts Slack single sign-on, so credentials cannot be
//! obtained headlessly. The user logs in with their own browser and pastes
//! the resulting session cookies back into the terminal.

use crate::auth::{AuthError, CookieJar};
use async_trait::async_trait;
use dialoguer::Input;
use url::Url;

/// Something that can produce a fresh credential set
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Runs a login and returns the resulting cookies
    async fn login(&self) -> Result<CookieJar, AuthError>;
}

/// Browser-assisted login driven from the terminal
pub struct InteractiveLogin {
    wiki_url: Url,
}

impl InteractiveLogin {
    pub fn new(wiki_url: Url) -> Self {
        Self { wiki_url }
    }
}

#[async_trait]
impl Authenticator for InteractiveLogin {
    async fn login(&self) -> Result<CookieJar, AuthError> {
        let wiki_url = self.wiki_url.clone();

        // dialoguer blocks on stdin
        tokio::task::spawn_blocking(move || prompt_for_cookies(&wiki_url))
            .await
            .map_err(|e| AuthError::Prompt(e.to_string()))?
    }
}

fn prompt_for_cookies(wiki_url: &Url) -> Result<CookieJar, AuthError> {
    let host = wiki_url.host_str().ok_or(AuthError::NoCookies)?.to_string();

    println!("Opening {}...", wiki_url);
    // The URL is printed above for when no browser can be launched
    if let Err(e) = open::that(wiki_url.as_str()) {
        tracing::warn!("Could not launch a browser: {}", e);
    }

    println!("\n{}", "=".repeat(50));
    println!("ACTION REQUIRED:");
    println!("1. Log in with Slack in the browser window.");
    println!("2. Click 'Accept' or 'Allow' if asked.");
    println!("3. WAIT until you see the Wiki Home Page.");
    println!("4. Copy the Cookie request header for {} from the", host);
    println!("   browser's developer tools and paste it below.");
    println!("{}\n", "=".repeat(50));

    let raw: String = Input::new()
        .with_prompt("Cookie header")
        .interact_text()
        .map_err(|e| AuthError::Prompt(e.to_string()))?;

    let jar = CookieJar::parse_header(&raw, &host)?;
    let wiki_cookies = jar.for_domain(&host).len();
    println!("Found {} cookies for the Wiki domain.", wiki_cookies);

    if jar.bearer_token().is_none() {
        tracing::warn!("No `jwt` or `token` cookie pasted; the GraphQL API may reject requests");
    }

    Ok(jar)
}
