/// Per-page outcome definitions for a scrape batch
///
/// Every URL handed to the scraper ends in exactly one of these outcomes.
use std::fmt;

/// Represents how a single page fared during a scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page was fetched, converted, and produced a document
    Scraped,

    /// Page title signalled a 404 / "Page Not Found"; skipped without error
    NotFound,

    /// Navigation, rendering, or conversion failed; reason attached
    Failed(String),
}

impl PageOutcome {
    /// Returns true if this page produced a document
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Scraped)
    }

    /// Returns true if this page was skipped as not found
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if this page failed
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label for logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scraped => "scraped",
            Self::NotFound => "not_found",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Where the loader is in its attempt / refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Enumerating and scraping with the current credentials (attempt index from 0)
    Attempt(u32),

    /// Previous attempt hit the login wall; fetching new credentials before the given attempt
    RefreshAuth(u32),
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempt(k) => write!(f, "attempt {}", k + 1),
            Self::RefreshAuth(k) => write!(f, "refresh before attempt {}", k + 1),
        }
    }
}
