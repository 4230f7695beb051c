//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageOutcome`: How an individual page fared (scraped, not found, failed)
//! - `LoadState`: Where the loader is in its attempt / credential refresh cycle

mod page_outcome;

pub use page_outcome::{LoadState, PageOutcome};
