//! Token records
//!
//! This module holds both ends of normalization:
//! - [`RawRecord`]: the schema-less record as the upstream delivered it
//! - [`CanonicalToken`]: the one shape every consumer sees
//!
//! [`canonicalize`] maps the former into the latter for API and scraped sources.

mod canonical;
mod raw;

pub use canonical::{
    api_keys, canonical_url, canonicalize, price_from_market_cap, scraped_keys, CanonicalToken,
    SourceKind, TOKEN_SUPPLY,
};
pub use raw::RawRecord;
