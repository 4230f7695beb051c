//! Authentication: session cookies, their persistence, and login
//!
//! - `CookieJar` / `Cookie`: the session credential set
//! - `CredentialStore`: the JSON cookie file
//! - `Authenticator`: the capability that produces fresh credentials

mod cookies;
mod login;

pub use cookies::{Cookie, CookieJar, CredentialStore};
pub use login::{Authenticator, InteractiveLogin};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while obtaining or persisting credentials
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No cookie file at {}", .0.display())]
    MissingCookieFile(PathBuf),

    #[error("No cookies were provided")]
    NoCookies,

    #[error("Login prompt failed: {0}")]
    Prompt(String),

    #[error("Invalid cookie file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
