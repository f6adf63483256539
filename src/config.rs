use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_MODEL: &str = "sonar-deep-research";

/// TCP connection establishment timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout. Deep-research completions routinely take over a minute.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Trusted financial, news and shipping-data providers the search is scoped to.
pub const ALLOWED_DOMAINS: [&str; 10] = [
    "bloomberg.com",
    "aljazeera.com",
    "reuters.com",
    "lloydslist.com",
    "ft.com",
    "seatrade-maritime.com",
    "kpler.com",
    "clarksons.com",
    "iea.org",
    "spglobal.com",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PERPLEXITY_API_KEY not set. Get one at https://www.perplexity.ai/settings/api")]
    ApiKeyNotSet,

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Clone)]
pub(crate) struct ApiKey(String);

impl ApiKey {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Settings shared by every query in a batch.
///
/// The allow-list is global: it is set here once and applied to every request,
/// never overridden per query.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub(crate) api_key: ApiKey,
    pub model: String,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Total attempts per query, including the first. `1` disables retry.
    pub max_attempts: u32,
    pub allowed_domains: Vec<String>,
}

impl SearchConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = normalize_key(&api_key.into()).ok_or(ConfigError::ApiKeyNotSet)?;
        Ok(Self {
            api_key: ApiKey(api_key),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: 1,
            allowed_domains: ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        })
    }

    /// Reads `PERPLEXITY_API_KEY`, `PERPLEXITY_MODEL` and `PERPLEXITY_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub(crate) fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("PERPLEXITY_API_KEY").ok_or(ConfigError::ApiKeyNotSet)?;
        let mut config = Self::new(api_key)?;

        if let Some(model) = non_empty(lookup("PERPLEXITY_MODEL")) {
            config.model = model;
        }
        if let Some(base_url) = non_empty(lookup("PERPLEXITY_BASE_URL")) {
            config = config.with_base_url(&base_url)?;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = url::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }
}

/// Trims whitespace and one layer of surrounding quotes, as left behind by `.env` loaders.
fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!key.is_empty()).then(|| key.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
