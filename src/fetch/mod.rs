//! Upstream acquisition
//!
//! This module contains everything that talks to the network:
//! - HTTP fetching with retry, backoff, and rate-limit handling
//! - Paginated collection from the listing API

mod collector;
mod retry;

pub use collector::{Collection, Collector, StopReason};
pub use retry::{
    build_http_client, parse_retry_after, FetchResult, Fetcher, PayloadKind, RawPayload,
    RetryPolicy,
};
