//! Search orchestration: concurrent query dispatch and result aggregation.

mod aggregate;
mod engine;
mod types;

pub use aggregate::{
    DEFAULT_MAX_CHARS_PER_SOURCE, NO_RESULTS, TRUNCATION_MARKER, format_query_digest,
    format_search_results,
};
pub use engine::{search_all, search_one};
pub use types::{QueryErrorKind, QueryResult, SourceRecord};
