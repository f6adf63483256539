use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::types::{QueryResult, SourceRecord};
use crate::perplexity::citations::PLACEHOLDER_URL;

pub const DEFAULT_MAX_CHARS_PER_SOURCE: usize = 4000;
pub const NO_RESULTS: &str = "No search results found.";
pub const TRUNCATION_MARKER: &str = "... [truncated]";

const HEADER: &str = "Content from sources:\n";
const SEPARATOR_WIDTH: usize = 80;

/// Renders every distinct source across `results` into one prompt-ready block.
///
/// Sources are deduplicated by URL: a repeated URL keeps the position where it
/// first appeared but takes the field values of its last occurrence.
/// Placeholder sources from uncited answers are kept apart per query.
pub fn format_search_results(results: &[QueryResult], max_chars_per_source: usize) -> String {
    let sources = unique_sources(results);
    if sources.is_empty() {
        return NO_RESULTS.to_string();
    }

    let separator = "=".repeat(SEPARATOR_WIDTH);
    let mut output = String::from(HEADER);

    for source in &sources {
        output.push_str(&separator);
        output.push('\n');
        output.push_str(&format!("Source: {}\n", source.title));
        output.push_str(&format!("URL: {}\n", source.url));
        output.push_str(&format!("Most relevant content: {}\n", source.content));

        if !source.raw_content.is_empty() {
            output.push_str("Full content:\n");
            output.push_str(&truncate_chars(&source.raw_content, max_chars_per_source));
            output.push('\n');
        }

        output.push_str(&separator);
        output.push_str("\n\n");
    }

    info!(sources = sources.len(), bytes = output.len(), "formatted search results");
    output
}

/// Compact rendering: one section per successful query, carrying its answer text once.
/// Returns an empty string when no query produced anything.
pub fn format_query_digest(results: &[QueryResult]) -> String {
    let usable: Vec<(&QueryResult, &SourceRecord)> = results
        .iter()
        .filter_map(|r| r.results.first().map(|first| (r, first)))
        .collect();

    for failed in results.iter().filter(|r| r.is_error()) {
        warn!(
            query = %failed.query,
            message = failed.message.as_deref().unwrap_or_default(),
            "omitting failed query from digest"
        );
    }

    if usable.is_empty() {
        warn!("no usable search results to digest");
        return String::new();
    }

    let mut output = String::from("\n\nWeb Search Results:\n");
    for (i, (result, first)) in usable.iter().enumerate() {
        output.push_str(&format!(
            "\n---Result {}: {}---\n{}\n",
            i + 1,
            result.query,
            first.content
        ));
    }

    debug!(results = usable.len(), "formatted query digest");
    output
}

#[derive(PartialEq, Eq, Hash)]
enum DedupKey<'a> {
    Url(&'a str),
    /// Placeholder records are distinct per originating query.
    Placeholder(&'a str),
}

fn unique_sources(results: &[QueryResult]) -> Vec<&SourceRecord> {
    let mut position: HashMap<DedupKey<'_>, usize> = HashMap::new();
    let mut sources: Vec<&SourceRecord> = Vec::new();

    for result in results {
        for source in &result.results {
            let key = dedup_key(&result.query, source);
            match position.get(&key) {
                Some(&i) => sources[i] = source,
                None => {
                    position.insert(key, sources.len());
                    sources.push(source);
                }
            }
        }
    }

    sources
}

fn dedup_key<'a>(query: &'a str, source: &'a SourceRecord) -> DedupKey<'a> {
    if source.url == PLACEHOLDER_URL {
        DedupKey::Placeholder(query)
    } else {
        DedupKey::Url(&source.url)
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{TRUNCATION_MARKER}", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::QueryErrorKind;

    fn record(url: &str, title: &str, content: &str, raw: &str) -> SourceRecord {
        SourceRecord {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            raw_content: raw.into(),
        }
    }

    fn result(query: &str, records: Vec<SourceRecord>) -> QueryResult {
        let citations = records.iter().map(|r| r.url.clone()).collect();
        QueryResult::success(query, records, citations)
    }

    fn block_count(text: &str) -> usize {
        text.matches("Source: ").count()
    }

    #[test]
    fn empty_input_returns_sentinel() {
        assert_eq!(format_search_results(&[], 4000), NO_RESULTS);
    }

    #[test]
    fn results_without_sources_return_sentinel() {
        let results = vec![
            result("a", vec![]),
            QueryResult::failure("b", QueryErrorKind::Exception, "Exception searching 'b': x"),
        ];
        assert_eq!(format_search_results(&results, 4000), NO_RESULTS);
    }

    #[test]
    fn renders_block_layout() {
        let results = vec![result(
            "q",
            vec![record("https://reuters.com/x", "Citations", "short", "full text")],
        )];

        let text = format_search_results(&results, 4000);
        let sep = "=".repeat(80);

        let expected = format!(
            "Content from sources:\n{sep}\nSource: Citations\nURL: https://reuters.com/x\n\
             Most relevant content: short\nFull content:\nfull text\n{sep}\n\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn duplicate_url_renders_once_with_last_values() {
        let results = vec![
            result("q1", vec![record("https://ft.com/a", "Citations", "first", "")]),
            result("q2", vec![record("https://ft.com/a", "Citations", "second", "")]),
        ];

        let text = format_search_results(&results, 4000);

        assert_eq!(block_count(&text), 1);
        assert!(text.contains("Most relevant content: second"));
        assert!(!text.contains("Most relevant content: first"));
    }

    #[test]
    fn duplicate_keeps_first_seen_position() {
        let results = vec![
            result(
                "q1",
                vec![
                    record("https://a.example", "A", "a-old", ""),
                    record("https://b.example", "B", "b", ""),
                ],
            ),
            result("q2", vec![record("https://a.example", "A", "a-new", "")]),
        ];

        let text = format_search_results(&results, 4000);

        let a = text.find("URL: https://a.example").unwrap();
        let b = text.find("URL: https://b.example").unwrap();
        assert!(a < b, "a.example should stay ahead of b.example");
        assert!(text.contains("a-new"));
        assert_eq!(block_count(&text), 2);
    }

    #[test]
    fn placeholders_from_different_queries_do_not_collapse() {
        let results = vec![
            result(
                "tanker rates",
                vec![record(PLACEHOLDER_URL, "Perplexity Search Result", "tankers", "tankers")],
            ),
            result(
                "grain exports",
                vec![record(PLACEHOLDER_URL, "Perplexity Search Result", "grain", "grain")],
            ),
        ];

        let text = format_search_results(&results, 4000);

        assert_eq!(block_count(&text), 2);
        assert!(text.contains("Most relevant content: tankers"));
        assert!(text.contains("Most relevant content: grain"));
    }

    #[test]
    fn real_url_resembling_placeholder_key_stays_separate() {
        let results = vec![
            result(
                "tanker rates",
                vec![record(PLACEHOLDER_URL, "Perplexity Search Result", "uncited", "")],
            ),
            result(
                "other",
                vec![record(
                    "https://perplexity.ai/search#tanker rates",
                    "Citations",
                    "cited",
                    "",
                )],
            ),
        ];

        let text = format_search_results(&results, 4000);

        assert_eq!(block_count(&text), 2);
        assert!(text.contains("Most relevant content: uncited"));
        assert!(text.contains("Most relevant content: cited"));
    }

    #[test]
    fn long_raw_content_is_truncated_with_marker() {
        let raw = "x".repeat(50);
        let results = vec![result("q", vec![record("https://u", "T", "c", &raw)])];

        let text = format_search_results(&results, 10);

        assert!(text.contains(&format!("Full content:\n{}{TRUNCATION_MARKER}\n", "x".repeat(10))));
        assert!(!text.contains(&"x".repeat(11)));
    }

    #[test]
    fn raw_content_at_cap_is_unchanged() {
        let raw = "y".repeat(10);
        let results = vec![result("q", vec![record("https://u", "T", "c", &raw)])];

        let text = format_search_results(&results, 10);

        assert!(text.contains(&format!("Full content:\n{raw}\n")));
        assert!(!text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn empty_raw_content_omits_full_content_label() {
        let results = vec![result("q", vec![record("https://u", "T", "c", "")])];

        let text = format_search_results(&results, 4000);

        assert!(!text.contains("Full content:"));
        assert!(text.contains("Most relevant content: c"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("éééé", 2), format!("éé{TRUNCATION_MARKER}"));
        assert_eq!(truncate_chars("éé", 2), "éé");
        assert_eq!(truncate_chars("abc", 0), TRUNCATION_MARKER);
    }

    #[test]
    fn digest_lists_successful_queries_in_order() {
        let results = vec![
            result("freight", vec![record("https://u1", "T", "rates up", "")]),
            QueryResult::failure("opec", QueryErrorKind::Exception, "boom"),
            result("grain", vec![record("https://u2", "T", "exports down", "")]),
        ];

        let digest = format_query_digest(&results);

        assert!(digest.starts_with("\n\nWeb Search Results:\n"));
        assert!(digest.contains("\n---Result 1: freight---\nrates up\n"));
        assert!(digest.contains("\n---Result 2: grain---\nexports down\n"));
        assert!(!digest.contains("opec"));
    }

    #[test]
    fn digest_uses_first_record_only() {
        let results = vec![result(
            "q",
            vec![
                record("https://u1", "T", "shared answer", ""),
                record("https://u2", "T", "shared answer", ""),
            ],
        )];

        let digest = format_query_digest(&results);

        assert_eq!(digest.matches("shared answer").count(), 1);
    }

    #[test]
    fn digest_of_nothing_is_empty() {
        assert_eq!(format_query_digest(&[]), "");
        let failed = vec![QueryResult::failure("q", QueryErrorKind::Exception, "x")];
        assert_eq!(format_query_digest(&failed), "");
    }
}
