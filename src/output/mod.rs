//! Console output
//!
//! - `StatusLine`: the redrawn progress line shown while a graph runs
//! - `stats`: index statistics for the `stats` command

pub mod stats;
mod status;

pub use stats::{load_statistics, print_statistics, write_statistics, IndexStatistics};
pub use status::StatusLine;
