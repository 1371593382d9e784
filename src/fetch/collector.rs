//! Paginated collection from the listing API
//!
//! The collector walks the listing one page at a time, strictly in offset
//! order, and stops as soon as it has enough records, sees the end of the
//! data, or runs into a failure. Partial results are always returned.

use crate::config::CollectorConfig;
use crate::fetch::{FetchResult, Fetcher, PayloadKind};
use crate::token::RawRecord;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

/// Why a collection stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing was requested
    NothingRequested,

    /// Enough records were accumulated
    TargetReached,

    /// A page came back shorter than the page size: the upstream has no more data
    ShortPage,

    /// A page could not be fetched or was not a JSON array
    FetchFailed(String),

    /// The collection-wide deadline elapsed
    DeadlineExceeded,
}

/// Records gathered by one collection run
#[derive(Debug, Clone)]
pub struct Collection {
    /// Records in upstream order, at most the requested count
    pub records: Vec<RawRecord>,

    /// Pages whose fetch finished, successfully or not
    pub pages_fetched: usize,

    pub stop: StopReason,
}

impl Collection {
    /// Returns true if the collection ended without a failure
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            StopReason::TargetReached | StopReason::ShortPage | StopReason::NothingRequested
        )
    }
}

/// Drives a [`Fetcher`] across the pages of the listing API
pub struct Collector<'a> {
    fetcher: &'a Fetcher,
    endpoint: Url,
    config: CollectorConfig,
}

impl<'a> Collector<'a> {
    /// Creates a collector for the given listing endpoint
    pub fn new(fetcher: &'a Fetcher, endpoint: Url, config: CollectorConfig) -> Self {
        Self {
            fetcher,
            endpoint,
            config,
        }
    }

    /// Builds the listing endpoint (`{api_url}/coins`) from the API base URL
    pub fn listing_endpoint(api_url: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}/coins", api_url.trim_end_matches('/')))
    }

    /// Query parameters for the page starting at `offset`
    fn page_query(&self, offset: usize) -> Vec<(&'static str, String)> {
        vec![
            ("offset", offset.to_string()),
            ("limit", self.config.page_size.to_string()),
            ("sort", self.config.sort.clone()),
            ("order", self.config.order.clone()),
            ("includeNsfw", self.config.include_nsfw.to_string()),
        ]
    }

    /// Collects up to `target` records
    ///
    /// # Stop conditions
    ///
    /// | Condition | Stop reason |
    /// |-----------|-------------|
    /// | Accumulated ≥ target | `TargetReached` |
    /// | Page shorter than page size (including empty) | `ShortPage` |
    /// | Fetch failure or non-array body | `FetchFailed` |
    /// | Collection deadline elapsed | `DeadlineExceeded` |
    ///
    /// Records collected before a failure are kept. An empty result is a valid
    /// outcome; the caller decides on any fallback.
    pub async fn collect(&self, target: usize) -> Collection {
        if target == 0 {
            return Collection {
                records: Vec::new(),
                pages_fetched: 0,
                stop: StopReason::NothingRequested,
            };
        }

        let page_size = self.config.page_size.max(1);
        let deadline = self
            .config
            .collection_deadline()
            .map(|limit| Instant::now() + limit);

        let mut records: Vec<RawRecord> = Vec::new();
        let mut offset = 0usize;
        let mut pages_fetched = 0usize;

        let stop = loop {
            tracing::info!(endpoint = %self.endpoint, offset, "Fetching listing page");

            let query = self.page_query(offset);
            let fetch = self.fetcher.fetch(&self.endpoint, &query, PayloadKind::Json);
            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, fetch).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(offset, collected = records.len(), "Collection deadline exceeded");
                        break StopReason::DeadlineExceeded;
                    }
                },
                None => fetch.await,
            };
            pages_fetched += 1;

            let items = match result {
                FetchResult::Success { payload, .. } => match payload.into_json() {
                    Some(Value::Array(items)) => items,
                    _ => {
                        tracing::warn!(offset, "Listing page was not a JSON array");
                        break StopReason::FetchFailed("expected a JSON array".to_string());
                    }
                },
                failure => {
                    let reason = failure
                        .failure_reason()
                        .unwrap_or_else(|| "unknown failure".to_string());
                    tracing::warn!(
                        offset,
                        collected = records.len(),
                        reason = %reason,
                        "Stopping collection after page failure"
                    );
                    break StopReason::FetchFailed(reason);
                }
            };

            let page_len = items.len();
            tracing::info!(offset, count = page_len, "Received listing page");

            records.extend(items.into_iter().filter_map(|item| {
                let record = RawRecord::from_value(item);
                if record.is_none() {
                    tracing::warn!(offset, "Skipping non-object listing entry");
                }
                record
            }));

            if records.len() >= target {
                break StopReason::TargetReached;
            }
            if page_len < page_size {
                tracing::info!(offset, "Reached end of upstream listing");
                break StopReason::ShortPage;
            }

            offset += page_size;
        };

        records.truncate(target);
        tracing::info!(
            collected = records.len(),
            target,
            pages_fetched,
            stop = ?stop,
            "Collection finished"
        );

        Collection {
            records,
            pages_fetched,
            stop,
        }
    }
}
