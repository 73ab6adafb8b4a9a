//! Query dispatch over the verse index.
//!
//! - `keyword`: Case-insensitive substring matching on translations
//! - `session`: Owns corpus, provider and the per-query lifecycle
//! - `errors`: Per-query failures and their user-facing messages

mod errors;
mod keyword;
mod session;

use serde::{Deserialize, Serialize};

pub use errors::SearchError;
pub use session::{SearchLimits, SearchOutcome, SearchPhase, SearchSession};

/// Maximum number of keyword matches returned
pub const DEFAULT_KEYWORD_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
}
