use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::citations::extract_answer;
use super::types::{ApiError, ChatRequest, ChatResponse, Message, SearchAnswer, WebSearchOptions};
use crate::config::SearchConfig;

const TEMPERATURE: f32 = 0.2;
const TOP_P: f32 = 0.9;
const TOP_K: u32 = 0;
const PRESENCE_PENALTY: f32 = 0.0;
const FREQUENCY_PENALTY: f32 = 1.0;
const SEARCH_CONTEXT_SIZE: &str = "high";
const SEARCH_RECENCY: &str = "day";

const INITIAL_BACKOFF_MS: u64 = 2000;
const MAX_BACKOFF_MS: u64 = 60_000;
const ERROR_SNIPPET_CHARS: usize = 200;

const INSTRUCTION: &str = "You are an expert research assistant for an investment firm. \
Provide factual, unbiased, and up-to-date information strictly from the specified authoritative sources. \
Prioritize clarity, conciseness, and accuracy, and keep every finding aligned with the investment principles below. \
Cite sources clearly and only include information that is well-supported by the cited material. \
Maintain a professional, analytical, and objective tone.";

#[derive(Debug, thiserror::Error)]
pub enum PerplexityError {
    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response has no choices[0].message.content")]
    MissingContent,
}

/// A chat-completions backend that answers one query with citations.
/// Implemented by `PerplexityClient` for production; mock implementations used in tests.
#[allow(async_fn_in_trait)]
pub trait SearchClient {
    async fn complete(&self, query: &str, context: &str) -> Result<SearchAnswer, PerplexityError>;
}

#[derive(Debug, Clone)]
pub struct PerplexityClient {
    http: Client,
    config: SearchConfig,
}

impl PerplexityClient {
    pub fn new(config: SearchConfig) -> Result<Self, PerplexityError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn build_request<'a>(&'a self, query: &str, context: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message::system(system_prompt(&self.config.allowed_domains, context)),
                Message::user(query),
            ],
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            presence_penalty: PRESENCE_PENALTY,
            frequency_penalty: FREQUENCY_PENALTY,
            stream: false,
            return_images: false,
            return_related_questions: false,
            web_search_options: WebSearchOptions {
                search_context_size: SEARCH_CONTEXT_SIZE,
            },
            search_domain_filter: &self.config.allowed_domains,
            search_recency_filter: SEARCH_RECENCY,
        }
    }

    async fn send(&self, query: &str, context: &str) -> Result<ChatResponse, PerplexityError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = self.build_request(query, context);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Perplexity API rate limited");
            return Err(PerplexityError::RateLimited);
        }

        let text = response.text().await?;
        if !status.is_success() {
            if let Ok(body) = serde_json::from_str::<ChatResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(err, status.as_u16());
                warn!(error = %classified, "Perplexity API error");
                return Err(classified);
            }
            let snippet: String = text.chars().take(ERROR_SNIPPET_CHARS).collect();
            warn!(status = %status, "Perplexity API error (no structured body)");
            return Err(PerplexityError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: ChatResponse = serde_json::from_str(&text)?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err, status.as_u16());
            warn!(error = %classified, "Perplexity API error in 200 response");
            return Err(classified);
        }

        debug!(model = %self.config.model, "perplexity completion received");
        Ok(body)
    }
}

impl SearchClient for PerplexityClient {
    async fn complete(&self, query: &str, context: &str) -> Result<SearchAnswer, PerplexityError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.send(query, context).await {
                Ok(response) => return extract_answer(&response),
                Err(e) if is_retriable(&e) && attempt + 1 < max_attempts => {
                    let delay_ms = jittered_backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn system_prompt(domains: &[String], context: &str) -> String {
    let mut prompt = String::from(INSTRUCTION);
    if !domains.is_empty() {
        prompt.push_str("\n\nOnly use and cite these sources: ");
        prompt.push_str(&domains.join(", "));
        prompt.push('.');
    }
    prompt.push_str("\n\nInvestment Principles:\n");
    prompt.push_str(context);
    prompt
}

fn is_retriable(e: &PerplexityError) -> bool {
    match e {
        PerplexityError::RateLimited => true,
        PerplexityError::Api { code, .. } => (500..=599).contains(code),
        PerplexityError::Network(err) => err.is_timeout() || err.is_connect() || err.is_request(),
        PerplexityError::Decode(_) | PerplexityError::MissingContent => false,
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2), with base capped at `MAX_BACKOFF_MS`.
fn jittered_backoff(attempt: u32) -> u64 {
    let base = 2u64
        .checked_pow(attempt)
        .and_then(|factor| INITIAL_BACKOFF_MS.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |b| b.min(MAX_BACKOFF_MS));
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(err: &ApiError, status: u16) -> PerplexityError {
    let message = err
        .message
        .clone()
        .or_else(|| err.kind.clone())
        .unwrap_or_else(|| "Unknown error".to_string());

    let code = match &err.code {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|c| u16::try_from(c).ok()),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(status);

    match code {
        429 => PerplexityError::RateLimited,
        code => PerplexityError::Api { code, message },
    }
}
