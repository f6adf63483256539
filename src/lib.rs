//! Concurrent multi-query web research over the Perplexity chat-completions API.
//!
//! [`search::search_all`] fans a list of queries out to a [`SearchClient`],
//! and [`search::format_search_results`] folds the per-query results into one
//! deduplicated text block for a downstream generation prompt.

pub mod config;
pub mod perplexity;
pub mod search;

pub use config::{ConfigError, SearchConfig};
pub use perplexity::client::{PerplexityClient, PerplexityError, SearchClient};
pub use search::{QueryErrorKind, QueryResult, SourceRecord};

pub const USER_AGENT: &str = concat!("market-scout/", env!("CARGO_PKG_VERSION"));
