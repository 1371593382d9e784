//! Retrying HTTP fetcher
//!
//! This module issues every upstream request. One call to [`Fetcher::fetch`]
//! makes up to `max_retries` attempts, sleeping between them with exponential
//! backoff. It never returns an error type: the outcome, good or bad, is a
//! [`FetchResult`] and the caller decides what a failure means.

use crate::config::{Config, FetcherConfig, UpstreamConfig};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// What the caller expects the response body to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Json,
    Html,
}

impl PayloadKind {
    fn accept_header(&self) -> &'static str {
        match self {
            PayloadKind::Json => "application/json",
            PayloadKind::Html => "text/html,application/xhtml+xml",
        }
    }
}

/// A successfully parsed response body
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Json(Value),
    Html(String),
}

impl RawPayload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            RawPayload::Json(value) => Some(value),
            RawPayload::Html(_) => None,
        }
    }

    pub fn into_html(self) -> Option<String> {
        match self {
            RawPayload::Html(body) => Some(body),
            RawPayload::Json(_) => None,
        }
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A 2xx response whose body parsed as the expected kind
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Parsed body
        payload: RawPayload,
        /// Attempts used, including the successful one
        attempts: u32,
    },

    /// Every attempt ended in a non-2xx status; this is the last one seen
    HttpError { status_code: u16, attempts: u32 },

    /// Every attempt ended in a transport failure; this is the last one seen
    NetworkError {
        error: String,
        timed_out: bool,
        attempts: u32,
    },

    /// A 2xx response arrived but the body did not parse
    MalformedPayload {
        status_code: u16,
        error: String,
        attempts: u32,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            FetchResult::Success { attempts, .. }
            | FetchResult::HttpError { attempts, .. }
            | FetchResult::NetworkError { attempts, .. }
            | FetchResult::MalformedPayload { attempts, .. } => *attempts,
        }
    }

    /// Human-readable failure reason, or None on success
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::HttpError {
                status_code,
                attempts,
            } => Some(format!(
                "HTTP {} after {} attempt(s)",
                status_code, attempts
            )),
            FetchResult::NetworkError {
                error, attempts, ..
            } => Some(format!("{} after {} attempt(s)", error, attempts)),
            FetchResult::MalformedPayload { error, .. } => {
                Some(format!("malformed payload: {}", error))
            }
        }
    }
}

/// How long to wait between attempts and how many to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each following one
    pub base_delay: Duration,

    /// Ceiling applied to every delay, including server-supplied ones
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.backoff_base(),
            max_delay: config.max_backoff(),
        }
    }

    /// Exponential delay after the given zero-based attempt: `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay after an HTTP 429
    ///
    /// The server's `Retry-After` wins when present, but is never honoured
    /// beyond `max_delay`.
    pub fn rate_limit_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or_else(|| self.backoff(attempt))
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds (`"120"`, `"1.5"`) or an HTTP-date. A date in the
/// past means "retry now".
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Builds an HTTP client with the upstream's expected headers and timeouts
///
/// # Arguments
///
/// * `fetcher` - Timeout and pool settings
/// * `upstream` - Identification headers
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    fetcher: &FetcherConfig,
    upstream: &UpstreamConfig,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in [(ORIGIN, &upstream.origin), (REFERER, &upstream.referer)] {
        match HeaderValue::from_str(value) {
            Ok(header) => {
                headers.insert(name, header);
            }
            Err(_) => tracing::warn!(header = %name, "Skipping invalid header value"),
        }
    }

    Client::builder()
        .user_agent(upstream.user_agent.clone())
        .default_headers(headers)
        .timeout(fetcher.request_timeout())
        .connect_timeout(fetcher.connect_timeout())
        .pool_max_idle_per_host(fetcher.max_connections)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Outcome of one attempt, before the retry decision
enum Attempt {
    Success {
        final_url: String,
        status_code: u16,
        payload: RawPayload,
    },
    Malformed {
        status_code: u16,
        error: String,
    },
    Status {
        status_code: u16,
        retry_after: Option<Duration>,
    },
    Transport {
        error: String,
        timed_out: bool,
    },
}

/// HTTP fetcher with retry, backoff, and a cap on concurrent requests
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    /// Creates a fetcher from the full configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.fetcher, &config.upstream)?;
        Ok(Self::with_client(
            client,
            RetryPolicy::from_config(&config.fetcher),
            config.fetcher.max_connections,
        ))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, policy: RetryPolicy, max_connections: usize) -> Self {
        Self {
            client,
            policy,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL with retry and backoff
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Parse body; a parse failure is returned, not retried |
    /// | HTTP 429 | Wait `Retry-After` (capped) or `base * 2^attempt`, retry |
    /// | HTTP 502/503 | Wait `base * 2^attempt`, retry |
    /// | Other status | Wait `base * 2^attempt`, retry |
    /// | Timeout / connection error | Wait `base * 2^attempt`, retry |
    ///
    /// Once `max_attempts` is used up the last failure is returned. There is
    /// no sleep after the final attempt.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `query` - Query parameters appended to the URL
    /// * `kind` - How to parse a successful body
    pub async fn fetch(&self, url: &Url, query: &[(&str, String)], kind: PayloadKind) -> FetchResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let attempts = attempt + 1;
            let is_last = attempts >= max_attempts;

            tracing::debug!(url = %url, attempt = attempts, max_attempts, "Fetching");

            let delay = match self.attempt(url, query, kind).await {
                Attempt::Success {
                    final_url,
                    status_code,
                    payload,
                } => {
                    tracing::debug!(url = %url, status_code, attempts, "Fetch succeeded");
                    return FetchResult::Success {
                        final_url,
                        status_code,
                        payload,
                        attempts,
                    };
                }
                Attempt::Malformed { status_code, error } => {
                    tracing::error!(url = %url, status_code, error = %error, "Malformed upstream payload");
                    return FetchResult::MalformedPayload {
                        status_code,
                        error,
                        attempts,
                    };
                }
                Attempt::Status {
                    status_code,
                    retry_after,
                } => {
                    if is_last {
                        tracing::error!(url = %url, status_code, attempts, "Giving up after HTTP error");
                        return FetchResult::HttpError {
                            status_code,
                            attempts,
                        };
                    }

                    if status_code == StatusCode::TOO_MANY_REQUESTS.as_u16() {
                        let delay = self.policy.rate_limit_delay(attempt, retry_after);
                        tracing::warn!(
                            url = %url,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            server_supplied = retry_after.is_some(),
                            "Rate limited, backing off"
                        );
                        delay
                    } else {
                        let delay = self.policy.backoff(attempt);
                        let transient = matches!(status_code, 502 | 503);
                        tracing::warn!(
                            url = %url,
                            status_code,
                            transient,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Upstream returned error status, retrying"
                        );
                        delay
                    }
                }
                Attempt::Transport { error, timed_out } => {
                    if is_last {
                        tracing::error!(url = %url, error = %error, attempts, "Giving up after network error");
                        return FetchResult::NetworkError {
                            error,
                            timed_out,
                            attempts,
                        };
                    }

                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        url = %url,
                        error = %error,
                        timed_out,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Network error, retrying"
                    );
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Makes a single request and classifies the outcome
    async fn attempt(&self, url: &Url, query: &[(&str, String)], kind: PayloadKind) -> Attempt {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Attempt::Transport {
                    error: "Connection limiter closed".to_string(),
                    timed_out: false,
                }
            }
        };

        let response = match self
            .client
            .get(url.clone())
            .query(query)
            .header(ACCEPT, kind.accept_header())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Status {
                status_code: status.as_u16(),
                retry_after: retry_after_header(&response),
            };
        }

        let final_url = response.url().to_string();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return classify_transport_error(&e),
        };

        match parse_body(&body, kind) {
            Ok(payload) => Attempt::Success {
                final_url,
                status_code: status.as_u16(),
                payload,
            },
            Err(error) => Attempt::Malformed {
                status_code: status.as_u16(),
                error,
            },
        }
    }
}

fn classify_transport_error(error: &reqwest::Error) -> Attempt {
    let timed_out = error.is_timeout();
    let error = if timed_out {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else {
        error.to_string()
    };
    Attempt::Transport { error, timed_out }
}

fn retry_after_header(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

fn parse_body(body: &[u8], kind: PayloadKind) -> Result<RawPayload, String> {
    match kind {
        PayloadKind::Json => serde_json::from_slice::<Value>(body)
            .map(RawPayload::Json)
            .map_err(|e| e.to_string()),
        PayloadKind::Html => String::from_utf8(body.to_vec())
            .map(RawPayload::Html)
            .map_err(|e| e.to_string()),
    }
}
