//! Two-tier result cache
//!
//! The cache holds the last successful result set. Reads are classified by
//! age: fresh data is served without touching the upstream; anything older
//! triggers a refresh through a caller-supplied producer. When the producer
//! fails, whatever was cached last is served no matter how old it is.
//! Only a cold cache plus a failed producer is an error.

mod entry;

pub use entry::{CacheEntry, CachePolicy, Freshness};

use crate::config::CacheConfig;
use crate::token::CanonicalToken;
use crate::BoardError;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// How a read was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from a fresh entry without calling the producer
    Fresh,

    /// The producer ran and its result was stored
    Refreshed,

    /// The producer failed and an older entry was served instead
    Fallback { age: Duration, freshness: Freshness },
}

impl ReadSource {
    /// Returns true if the data may be out of date
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Result of a cache read
#[derive(Debug, Clone)]
pub struct CacheRead {
    pub tokens: Arc<Vec<CanonicalToken>>,
    pub last_updated: DateTime<Utc>,
    pub source: ReadSource,
}

/// Owned, shareable cache for the token result set
///
/// The entry is swapped as a whole under a short write lock and never edited
/// in place, so readers always see one complete result set. Concurrent
/// refreshes are last-writer-wins.
#[derive(Debug)]
pub struct TokenCache {
    policy: CachePolicy,
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl TokenCache {
    /// Creates an empty cache
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entry: RwLock::new(None),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(CachePolicy::from_config(config))
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Returns the current entry, if any
    pub fn snapshot(&self) -> Option<Arc<CacheEntry>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cached set with `tokens`, stamped now
    pub fn store(&self, tokens: Vec<CanonicalToken>, target: usize) -> Arc<CacheEntry> {
        self.store_entry(CacheEntry::new(tokens, target))
    }

    /// Replaces the cached set with a prepared entry
    pub fn store_entry(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&entry));
        entry
    }

    /// Classifies the current entry at `now`
    pub fn freshness_at(&self, now: DateTime<Utc>) -> Freshness {
        self.snapshot()
            .map(|entry| entry.freshness_at(&self.policy, now))
            .unwrap_or(Freshness::Empty)
    }

    /// Classifies the current entry
    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Utc::now())
    }

    /// Looks up a single token in the cached set
    pub fn find(&self, identifier: &str) -> Option<CanonicalToken> {
        self.snapshot()
            .and_then(|entry| entry.find(identifier).cloned())
    }

    /// Reads through the cache
    ///
    /// # Behaviour
    ///
    /// | Cache state | `force_refresh` | Producer result | Outcome |
    /// |-------------|-----------------|-----------------|---------|
    /// | Fresh | false | not called | cached tokens (`Fresh`) |
    /// | any | any | non-empty | stored and returned (`Refreshed`) |
    /// | Stale/Expired/Fresh | any | error or empty | cached tokens (`Fallback`) |
    /// | Empty | any | error or empty | `BoardError::Unavailable` |
    ///
    /// # Arguments
    ///
    /// * `force_refresh` - Skip the freshness check (never the fallback)
    /// * `target` - Requested count, recorded on the stored entry
    /// * `producer` - Fetches a new result set on a miss
    pub async fn get_or_populate<F, Fut>(
        &self,
        force_refresh: bool,
        target: usize,
        producer: F,
    ) -> Result<CacheRead, BoardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CanonicalToken>, BoardError>>,
    {
        let now = Utc::now();
        let current = self.snapshot();

        if let Some(entry) = current.as_ref() {
            let freshness = entry.freshness_at(&self.policy, now);
            if !force_refresh && freshness.is_fresh() {
                tracing::debug!(
                    age_secs = entry.age_at(now).num_seconds(),
                    count = entry.tokens.len(),
                    "Serving fresh cache"
                );
                return Ok(CacheRead {
                    tokens: Arc::clone(&entry.tokens),
                    last_updated: entry.last_updated,
                    source: ReadSource::Fresh,
                });
            }
            tracing::debug!(%freshness, force_refresh, "Cache miss, refreshing");
        } else {
            tracing::debug!("Cache empty, populating");
        }

        let failure = match producer().await {
            Ok(tokens) if !tokens.is_empty() => {
                let count = tokens.len();
                let entry = self.store(tokens, target);
                tracing::info!(count, "Cache refreshed");
                return Ok(CacheRead {
                    tokens: Arc::clone(&entry.tokens),
                    last_updated: entry.last_updated,
                    source: ReadSource::Refreshed,
                });
            }
            Ok(_) => "upstream returned no tokens".to_string(),
            Err(e) => e.to_string(),
        };

        // Re-read so a refresh that finished concurrently is preferred
        match self.snapshot().or(current) {
            Some(entry) => {
                let now = Utc::now();
                let age = entry.age_at(now);
                let freshness = entry.freshness_at(&self.policy, now);
                tracing::warn!(
                    reason = %failure,
                    age_secs = age.num_seconds(),
                    %freshness,
                    "Refresh failed, serving cached data"
                );
                Ok(CacheRead {
                    tokens: Arc::clone(&entry.tokens),
                    last_updated: entry.last_updated,
                    source: ReadSource::Fallback { age, freshness },
                })
            }
            None => {
                tracing::error!(reason = %failure, "Refresh failed and cache is empty");
                Err(BoardError::Unavailable { reason: failure })
            }
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
