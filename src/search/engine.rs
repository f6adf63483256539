use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::types::{QueryErrorKind, QueryResult};
use crate::perplexity::citations::source_records;
use crate::perplexity::client::SearchClient;

/// Runs every query against `client` with at most `max_concurrency` in flight.
///
/// The returned vector is index-aligned with `queries` whatever order the
/// responses arrive in. Per-query failures are reported in-band; this never
/// fails as a whole and one query's failure never cancels another.
pub async fn search_all<C, Q>(
    client: &C,
    queries: &[Q],
    context: &str,
    max_concurrency: usize,
) -> Vec<QueryResult>
where
    C: SearchClient,
    Q: AsRef<str>,
{
    if queries.is_empty() {
        return Vec::new();
    }

    let limit = max_concurrency.max(1);
    info!(queries = queries.len(), concurrency = limit, "dispatching search batch");

    // `buffered` yields in submission order, so no re-sorting is needed.
    let results: Vec<QueryResult> = stream::iter(queries)
        .map(|q| search_one(client, q.as_ref(), context))
        .buffered(limit)
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_error()).count();
    info!(total = results.len(), failed, "search batch complete");
    results
}

pub async fn search_one<C: SearchClient>(client: &C, query: &str, context: &str) -> QueryResult {
    if query.trim().is_empty() {
        warn!("skipping search for empty query");
        return QueryResult::failure(query, QueryErrorKind::InvalidQuery, "Query is empty");
    }

    match client.complete(query, context).await {
        Ok(answer) => {
            debug!(query, citations = answer.citations.len(), "search succeeded");
            let records = source_records(&answer);
            QueryResult::success(query, records, answer.citations)
        }
        Err(e) => {
            warn!(query, error = %e, "search failed");
            QueryResult::failure(
                query,
                QueryErrorKind::Exception,
                format!("Exception searching '{query}': {e}"),
            )
        }
    }
}
