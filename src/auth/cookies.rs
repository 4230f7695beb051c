//! Session cookies and their on-disk store
//!
//! The cookie file is a JSON array in the shape browsers export: every record
//! carries `name`, `value` and `domain`, optionally `path`, `expires`,
//! `httpOnly`, `secure` and `sameSite`. Fields this crate does not know about
//! are kept so a load/save cycle never loses data.

use crate::auth::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A single browser cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cookie {
    /// Creates a cookie with only the required fields set
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: Some("/".to_string()),
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
            extra: Map::new(),
        }
    }

    /// Returns true if this cookie should be sent to `host`
    ///
    /// A cookie applies to its own domain and every subdomain of it; a leading
    /// dot on the cookie domain is ignored.
    pub fn applies_to(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        if domain.is_empty() {
            return false;
        }
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// An unordered set of session cookies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Looks up a cookie value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Returns the cookies that apply to `host`
    pub fn for_domain(&self, host: &str) -> Vec<&Cookie> {
        self.cookies.iter().filter(|c| c.applies_to(host)).collect()
    }

    /// Builds a `Cookie` header value for requests to `host`
    pub fn as_header(&self, host: &str) -> String {
        self.for_domain(host)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns the wiki's session token, if the login left one behind
    pub fn bearer_token(&self) -> Option<&str> {
        self.get("token").or_else(|| self.get("jwt"))
    }

    /// Parses a `name=value; name2=value2` string copied from a browser
    ///
    /// Every cookie is scoped to `domain`. Fragments without `=` or with an
    /// empty name are skipped.
    pub fn parse_header(input: &str, domain: &str) -> Result<Self, AuthError> {
        let input = input.trim();
        let input = input
            .strip_prefix("Cookie:")
            .or_else(|| input.strip_prefix("cookie:"))
            .unwrap_or(input);

        let cookies: Vec<Cookie> = input
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(Cookie::new(name, value.trim(), domain))
            })
            .collect();

        if cookies.is_empty() {
            return Err(AuthError::NoCookies);
        }

        Ok(Self { cookies })
    }
}

/// Reads and writes the cookie file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the cookie jar
    ///
    /// # Returns
    ///
    /// * `Ok(CookieJar)` - The stored cookies
    /// * `Err(AuthError::MissingCookieFile)` - No cookie file on disk
    /// * `Err(AuthError)` - The file could not be read or parsed
    pub fn load(&self) -> Result<CookieJar, AuthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingCookieFile(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the cookie jar as pretty-printed JSON, replacing any existing file
    pub fn save(&self, jar: &CookieJar) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(jar)?;
        std::fs::write(&self.path, json)?;
        tracing::info!("Saved {} cookies to {}", jar.len(), self.path.display());
        Ok(())
    }

    /// Deletes the cookie file; returns whether one existed
    pub fn remove(&self) -> Result<bool, AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
