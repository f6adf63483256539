use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use market_scout::search::{self, DEFAULT_MAX_CHARS_PER_SOURCE};
use market_scout::{PerplexityClient, SearchConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "market-scout",
    version,
    about = "Run research queries concurrently against Perplexity and print one deduplicated digest",
    long_about = "Reads PERPLEXITY_API_KEY (required), PERPLEXITY_MODEL and PERPLEXITY_BASE_URL from the \
                  environment. Failed queries are reported inside the output rather than aborting the batch."
)]
struct Cli {
    /// Research queries, run in the order given
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,

    /// File with one query per line, appended after positional queries
    #[arg(long, value_name = "FILE")]
    queries_file: Option<PathBuf>,

    /// Investment context appended to every request's system instruction
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the investment context from a file
    #[arg(long, value_name = "FILE")]
    context_file: Option<PathBuf>,

    /// Per-source cap on full content, in characters
    #[arg(long, default_value_t = DEFAULT_MAX_CHARS_PER_SOURCE)]
    max_chars: usize,

    /// Maximum queries in flight at once
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Attempts per query, including the first (1 disables retry)
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    timeout: u64,

    /// TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    connect_timeout: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// Deduplicated source blocks
    Text,
    /// Raw per-query results as JSON
    Json,
    /// One section per query
    Digest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("market_scout=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut queries = cli.queries;
    if let Some(path) = &cli.queries_file {
        let text = tokio::fs::read_to_string(path).await?;
        queries.extend(read_query_lines(&text));
    }
    if queries.is_empty() {
        return Err("no queries given (pass QUERY arguments or --queries-file)".into());
    }

    let context = match (&cli.context, &cli.context_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) => String::new(),
    };

    let config = SearchConfig::from_env()?
        .with_max_attempts(cli.attempts)
        .with_request_timeout(Duration::from_secs(cli.timeout))
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));
    let client = PerplexityClient::new(config)?;

    info!(queries = queries.len(), "starting research batch");
    let results = search::search_all(&client, &queries, &context, cli.concurrency).await;

    let output = match cli.format {
        Format::Text => search::format_search_results(&results, cli.max_chars),
        Format::Json => serde_json::to_string_pretty(&results)?,
        Format::Digest => search::format_query_digest(&results),
    };
    println!("{output}");

    Ok(())
}

fn read_query_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}
