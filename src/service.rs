//! Token service: the two operations the front end exposes
//!
//! `list_tokens` reads the ranked board through the cache, refreshing it from
//! the listing API (or the `/board` page when the API yields nothing).
//! `get_token` answers from the cache when it can and scrapes the token's own
//! page when it cannot.

use crate::cache::{CacheRead, ReadSource, TokenCache};
use crate::config::Config;
use crate::extract::{extract_detail, extract_listing};
use crate::fetch::{Collector, FetchResult, Fetcher, PayloadKind};
use crate::token::{canonicalize, scraped_keys, CanonicalToken, SourceKind};
use crate::{BoardError, ConfigError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

/// Largest `limit` a caller may request
pub const MAX_LIMIT: usize = 1000;

/// Tokens returned by [`TokenService::list_tokens`]
#[derive(Debug, Clone)]
pub struct TokenListing {
    /// At most `limit` tokens in rank order
    pub tokens: Vec<CanonicalToken>,

    /// When the underlying result set was collected
    pub last_updated: DateTime<Utc>,

    pub source: ReadSource,
}

impl TokenListing {
    fn from_read(read: CacheRead, limit: usize) -> Self {
        Self {
            tokens: read.tokens.iter().take(limit).cloned().collect(),
            last_updated: read.last_updated,
            source: read.source,
        }
    }
}

/// Orchestrates fetching, extraction, canonicalization, and caching
pub struct TokenService {
    config: Config,
    fetcher: Fetcher,
    cache: Arc<TokenCache>,
    listing_endpoint: Url,
}

impl TokenService {
    /// Creates a service with its own empty cache
    pub fn new(config: Config) -> Result<Self> {
        let cache = Arc::new(TokenCache::from_config(&config.cache));
        Self::with_cache(config, cache)
    }

    /// Creates a service that shares an existing cache
    pub fn with_cache(config: Config, cache: Arc<TokenCache>) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        let listing_endpoint = Collector::listing_endpoint(&config.upstream.api_url)?;

        tracing::debug!(
            endpoint = %listing_endpoint,
            site = %config.upstream.site_url,
            "Token service ready"
        );

        Ok(Self {
            config,
            fetcher,
            cache,
            listing_endpoint,
        })
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lists the top `limit` tokens by market cap
    ///
    /// A fresh cache entry collected for fewer than `limit` tokens does not
    /// answer the request and is refreshed. On refresh failure any cached
    /// entry is served, regardless of age or size.
    pub async fn list_tokens(&self, limit: usize, force_refresh: bool) -> Result<TokenListing> {
        if limit == 0 || limit > MAX_LIMIT {
            return Err(BoardError::InvalidLimit {
                limit,
                max: MAX_LIMIT,
            });
        }

        let uncovered = self
            .cache
            .snapshot()
            .map(|entry| !entry.covers(limit))
            .unwrap_or(false);
        if uncovered {
            tracing::debug!(limit, "Cached set too small for request, refreshing");
        }

        let read = self
            .cache
            .get_or_populate(force_refresh || uncovered, limit, || self.refresh(limit))
            .await?;

        Ok(TokenListing::from_read(read, limit))
    }

    /// Collects a new result set without touching the cache
    ///
    /// The listing API is tried first; if it yields no records the `/board`
    /// page is scraped instead.
    pub async fn refresh(&self, limit: usize) -> Result<Vec<CanonicalToken>> {
        let site_url = &self.config.upstream.site_url;

        let collector = Collector::new(
            &self.fetcher,
            self.listing_endpoint.clone(),
            self.config.collector.clone(),
        );
        let collection = collector.collect(limit).await;

        if !collection.records.is_empty() {
            if !collection.is_complete() {
                tracing::warn!(
                    collected = collection.records.len(),
                    limit,
                    stop = ?collection.stop,
                    "Using partial collection"
                );
            }
            return Ok(collection
                .records
                .iter()
                .map(|record| canonicalize(record, SourceKind::Api, site_url))
                .collect());
        }

        tracing::warn!(stop = ?collection.stop, "Listing API yielded nothing, scraping board page");

        let board = self.board_url(None)?;
        let html = match self.fetcher.fetch(&board, &[], PayloadKind::Html).await {
            FetchResult::Success { payload, .. } => payload.into_html().unwrap_or_default(),
            failure => {
                let reason = failure
                    .failure_reason()
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(BoardError::Unavailable {
                    reason: format!("listing API and board page both failed: {}", reason),
                });
            }
        };

        let tokens: Vec<CanonicalToken> = extract_listing(&html)
            .iter()
            .take(limit)
            .map(|record| canonicalize(record, SourceKind::Scraped, site_url))
            .collect();

        if tokens.is_empty() {
            return Err(BoardError::Unavailable {
                reason: "no tokens found on listing API or board page".to_string(),
            });
        }

        tracing::info!(count = tokens.len(), "Scraped tokens from board page");
        Ok(tokens)
    }

    /// Looks up one token by identifier
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Blank identifier | `InvalidIdentifier` |
    /// | Token page could not be fetched | `Unavailable` |
    /// | Page has neither a name nor a market cap | `NotFound` |
    pub async fn get_token(&self, identifier: &str) -> Result<CanonicalToken> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(BoardError::InvalidIdentifier);
        }

        if let Some(token) = self.cache.find(identifier) {
            tracing::debug!(identifier, "Token served from cache");
            return Ok(token);
        }

        let url = self.board_url(Some(identifier))?;
        tracing::info!(identifier, url = %url, "Scraping token page");

        let html = match self.fetcher.fetch(&url, &[], PayloadKind::Html).await {
            FetchResult::Success { payload, .. } => payload.into_html().unwrap_or_default(),
            FetchResult::HttpError {
                status_code: 404, ..
            } => {
                return Err(BoardError::NotFound {
                    identifier: identifier.to_string(),
                })
            }
            failure => {
                return Err(BoardError::Unavailable {
                    reason: failure
                        .failure_reason()
                        .unwrap_or_else(|| "unknown failure".to_string()),
                })
            }
        };

        let record = extract_detail(&html, identifier);
        if !record.has(scraped_keys::NAME) && !record.has(scraped_keys::MARKET_CAP) {
            tracing::info!(identifier, "Token page had no recognizable token data");
            return Err(BoardError::NotFound {
                identifier: identifier.to_string(),
            });
        }

        Ok(canonicalize(
            &record,
            SourceKind::Scraped,
            &self.config.upstream.site_url,
        ))
    }

    /// `{site_url}/board` or `{site_url}/board/{identifier}`
    fn board_url(&self, identifier: Option<&str>) -> Result<Url> {
        let site_url = &self.config.upstream.site_url;
        let mut url = Url::parse(site_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConfigError::InvalidUrl(site_url.clone()))?;
            segments.pop_if_empty().push("board");
            if let Some(identifier) = identifier {
                segments.push(identifier);
            }
        }
        Ok(url)
    }
}
