use serde::{Deserialize, Serialize};

/// One piece of supporting evidence for a query's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    /// Deduplication key when aggregating.
    pub url: String,
    pub content: String,
    pub raw_content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    /// Transport, status, or body failure while talking to the provider.
    Exception,
    /// Blank query, rejected before any request.
    InvalidQuery,
}

/// Outcome of a single query. Failures are reported in-band via `error` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<SourceRecord>,
    pub citations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResult {
    pub fn success(query: &str, results: Vec<SourceRecord>, citations: Vec<String>) -> Self {
        Self {
            query: query.to_string(),
            results,
            citations,
            error: None,
            message: None,
        }
    }

    pub fn failure(query: &str, kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            citations: Vec::new(),
            error: Some(kind),
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
