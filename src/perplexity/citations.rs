use tracing::warn;

use super::client::PerplexityError;
use super::types::{ChatResponse, SearchAnswer};
use crate::search::SourceRecord;

pub const CITATION_TITLE: &str = "Citations";
pub const PLACEHOLDER_TITLE: &str = "Perplexity Search Result";
/// Stands in for a source when the provider answered without citing anything.
pub const PLACEHOLDER_URL: &str = "https://perplexity.ai/search";

/// Pulls the answer text and the citation list out of a completion.
/// Citations are kept exactly as the provider sent them.
pub fn extract_answer(response: &ChatResponse) -> Result<SearchAnswer, PerplexityError> {
    let content = response
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|choice| choice.message.as_ref())
        .and_then(|message| message.content.clone())
        .ok_or(PerplexityError::MissingContent)?;

    if content.is_empty() {
        warn!("Perplexity returned an empty answer");
    }

    let citations = response.citations.clone().unwrap_or_default();

    Ok(SearchAnswer { content, citations })
}

/// One record per cited URL, all sharing the single answer text. Blank
/// citation entries are skipped; an answer left with no usable citation
/// becomes one placeholder record.
pub fn source_records(answer: &SearchAnswer) -> Vec<SourceRecord> {
    let urls: Vec<&str> = answer
        .citations
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();

    if urls.is_empty() {
        return vec![SourceRecord {
            title: PLACEHOLDER_TITLE.to_string(),
            url: PLACEHOLDER_URL.to_string(),
            content: answer.content.clone(),
            raw_content: answer.content.clone(),
        }];
    }

    urls.into_iter()
        .map(|url| SourceRecord {
            title: CITATION_TITLE.to_string(),
            url: url.to_string(),
            content: answer.content.clone(),
            raw_content: answer.content.clone(),
        })
        .collect()
}
