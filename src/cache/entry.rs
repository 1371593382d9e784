//! Cached result sets and their age classification

use crate::config::CacheConfig;
use crate::token::CanonicalToken;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// Age classification of the cached result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Nothing has been cached yet
    Empty,

    /// Younger than the fresh TTL: serve without refetching
    Fresh,

    /// Past the fresh TTL but within the fallback ceiling
    Stale,

    /// Past the fallback ceiling; still served when nothing else is available
    Expired,
}

impl Freshness {
    /// Returns true if the entry may be served without asking the upstream
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// The two age thresholds that drive [`Freshness`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub fresh_ttl: Duration,
    pub fallback_ceiling: Duration,
}

impl CachePolicy {
    pub fn new(fresh_ttl: Duration, fallback_ceiling: Duration) -> Self {
        Self {
            fresh_ttl,
            fallback_ceiling,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::seconds(config.fresh_ttl_secs as i64),
            Duration::seconds(config.fallback_ceiling_secs as i64),
        )
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// One complete result set and when it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Tokens in upstream rank order
    pub tokens: Arc<Vec<CanonicalToken>>,

    /// When the set was stored
    pub last_updated: DateTime<Utc>,

    /// How many tokens were requested when the set was collected
    pub target: usize,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(tokens: Vec<CanonicalToken>, target: usize) -> Self {
        Self::stored_at(tokens, target, Utc::now())
    }

    /// Creates an entry with an explicit timestamp
    pub fn stored_at(tokens: Vec<CanonicalToken>, target: usize, at: DateTime<Utc>) -> Self {
        Self {
            tokens: Arc::new(tokens),
            last_updated: at,
            target,
        }
    }

    /// Age of the entry relative to `now`; never negative
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).max(Duration::zero())
    }

    /// Classifies the entry against the policy thresholds
    pub fn freshness_at(&self, policy: &CachePolicy, now: DateTime<Utc>) -> Freshness {
        let age = self.age_at(now);
        if age < policy.fresh_ttl {
            Freshness::Fresh
        } else if age < policy.fallback_ceiling {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Returns true if this entry can answer a request for `limit` tokens
    ///
    /// That is the case when it holds at least `limit` tokens, or when it was
    /// collected for at least `limit` and the upstream simply had fewer.
    pub fn covers(&self, limit: usize) -> bool {
        self.tokens.len() >= limit || self.target >= limit
    }

    /// Finds a token by identifier or by the last segment of its canonical URL
    pub fn find(&self, identifier: &str) -> Option<&CanonicalToken> {
        self.tokens
            .iter()
            .find(|token| token.matches_identifier(identifier))
    }
}
