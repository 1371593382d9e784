use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Token-Board
///
/// Every section and key has a default, so an empty file (or no file at all)
/// yields a working configuration pointed at the public upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Where the upstream lives and how we introduce ourselves to it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the structured listing API
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Base URL of the public site, used for scraping and canonical URLs
    #[serde(rename = "site-url")]
    pub site_url: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Value of the `Origin` header sent with every request
    pub origin: String,

    /// Value of the `Referer` header sent with every request
    pub referer: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://frontend-api.pump.fun".to_string(),
            site_url: "https://pump.fun".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            origin: "https://pump.fun".to_string(),
            referer: "https://pump.fun/".to_string(),
        }
    }
}

/// Retry and transport behaviour of the fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Total number of attempts per request, including the first
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single retry delay, server-supplied or computed (milliseconds)
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Total time allowed for one attempt, body included (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Maximum number of requests in flight at once
    #[serde(rename = "max-connections")]
    pub max_connections: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base_ms: 1_000,
            max_backoff_ms: 30_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_connections: 10,
        }
    }
}

impl FetcherConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Pagination parameters for the listing API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    #[serde(rename = "page-size")]
    pub page_size: usize,

    /// Field the upstream sorts by
    pub sort: String,

    /// Sort direction, `ASC` or `DESC`
    pub order: String,

    #[serde(rename = "include-nsfw")]
    pub include_nsfw: bool,

    /// Wall-clock ceiling for one whole collection; 0 disables it (seconds)
    #[serde(rename = "collection-deadline-secs")]
    pub collection_deadline_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            sort: "market_cap".to_string(),
            order: "DESC".to_string(),
            include_nsfw: false,
            collection_deadline_secs: 120,
        }
    }
}

impl CollectorConfig {
    pub fn collection_deadline(&self) -> Option<Duration> {
        match self.collection_deadline_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Cache freshness thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age below which cached data is served without touching the upstream (seconds)
    #[serde(rename = "fresh-ttl-secs")]
    pub fresh_ttl_secs: u64,

    /// Age beyond which cached data is only served as a last resort (seconds)
    #[serde(rename = "fallback-ceiling-secs")]
    pub fallback_ceiling_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_secs: 300,
            fallback_ceiling_secs: 86_400,
        }
    }
}
