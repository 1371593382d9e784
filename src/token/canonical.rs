//! Canonical token shape and the mapping into it

use crate::token::RawRecord;
use serde::{Deserialize, Serialize};

/// Every token on the board has the same fixed supply
pub const TOKEN_SUPPLY: f64 = 1_000_000_000.0;

/// Decimal digits kept on derived prices
const PRICE_DECIMALS: i32 = 8;

/// Field names used by the listing API
pub mod api_keys {
    pub const NAME: &str = "name";
    pub const MARKET_CAP: &str = "usd_market_cap";
    pub const DESCRIPTION: &str = "description";
    pub const REPLIES: &str = "reply_count";
    pub const IMAGE: &str = "image_uri";
    pub const IDENTIFIER: &str = "mint";
}

/// Field names produced by the HTML extraction chain
pub mod scraped_keys {
    pub const NAME: &str = "name";
    pub const MARKET_CAP: &str = "market_cap";
    pub const DESCRIPTION: &str = "description";
    pub const IMAGE: &str = "image_url";
    pub const IDENTIFIER: &str = "identifier";
    pub const HOLDERS: &str = "holders";
}

/// Where a raw record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A JSON object from the listing API
    Api,
    /// A field bag assembled from an HTML fragment
    Scraped,
}

/// The normalized unit of output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalToken {
    pub name: String,
    pub identifier: String,
    pub market_cap: f64,
    pub price: f64,
    pub description: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holders: Option<u64>,
    pub canonical_url: String,
}

impl CanonicalToken {
    /// Returns true if this token is addressed by `identifier`
    ///
    /// Matches the identifier itself or a canonical URL ending in `/{identifier}`.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return false;
        }
        self.identifier == identifier
            || self
                .canonical_url
                .strip_suffix(identifier)
                .is_some_and(|rest| rest.ends_with('/'))
    }
}

/// Derives the per-token price from market cap
///
/// Returns 0 for a zero, negative, or non-finite market cap.
pub fn price_from_market_cap(market_cap: f64) -> f64 {
    if !market_cap.is_finite() || market_cap <= 0.0 {
        return 0.0;
    }
    let scale = 10f64.powi(PRICE_DECIMALS);
    (market_cap / TOKEN_SUPPLY * scale).round() / scale
}

/// Builds the public page URL for a token
pub fn canonical_url(site_url: &str, identifier: &str) -> String {
    format!("{}/board/{}", site_url.trim_end_matches('/'), identifier)
}

/// Maps a raw record into the canonical token shape
///
/// Missing strings become empty, unparsable numbers become 0, and the price
/// is always derived from the market cap. The function is pure.
///
/// # Arguments
///
/// * `record` - The raw upstream record
/// * `kind` - Which upstream shape the record has
/// * `site_url` - Base URL used to build `canonical_url`
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use token_board::token::{canonicalize, RawRecord, SourceKind};
///
/// let raw = RawRecord::from_value(json!({
///     "name": "  Pepe ",
///     "usd_market_cap": 45210.6,
///     "mint": "abc123",
///     "reply_count": 4
/// }))
/// .unwrap();
///
/// let token = canonicalize(&raw, SourceKind::Api, "https://pump.fun");
/// assert_eq!(token.name, "Pepe");
/// assert_eq!(token.market_cap, 45211.0);
/// assert_eq!(token.canonical_url, "https://pump.fun/board/abc123");
/// ```
pub fn canonicalize(record: &RawRecord, kind: SourceKind, site_url: &str) -> CanonicalToken {
    match kind {
        SourceKind::Api => {
            let identifier = record.text(api_keys::IDENTIFIER).trim().to_string();
            let market_cap = record.number(api_keys::MARKET_CAP).round();

            CanonicalToken {
                name: name_or_identifier(&record.text(api_keys::NAME), &identifier),
                market_cap,
                price: price_from_market_cap(market_cap),
                description: record.text(api_keys::DESCRIPTION),
                image_url: record.text(api_keys::IMAGE).trim().to_string(),
                replies: Some(record.count(api_keys::REPLIES)),
                holders: None,
                canonical_url: canonical_url(site_url, &identifier),
                identifier,
            }
        }
        SourceKind::Scraped => {
            let identifier = record.text(scraped_keys::IDENTIFIER).trim().to_string();
            let market_cap = record.number(scraped_keys::MARKET_CAP);
            let holders = record
                .has(scraped_keys::HOLDERS)
                .then(|| record.count(scraped_keys::HOLDERS));

            CanonicalToken {
                name: name_or_identifier(&record.text(scraped_keys::NAME), &identifier),
                market_cap,
                price: price_from_market_cap(market_cap),
                description: record.text(scraped_keys::DESCRIPTION).trim().to_string(),
                image_url: record.text(scraped_keys::IMAGE).trim().to_string(),
                replies: None,
                holders,
                canonical_url: canonical_url(site_url, &identifier),
                identifier,
            }
        }
    }
}

fn name_or_identifier(name: &str, identifier: &str) -> String {
    match name.trim() {
        "" => identifier.to_string(),
        trimmed => trimmed.to_string(),
    }
}
