//! HTML extraction for the scraping fallback path
//!
//! When the listing API is unusable the board has to be read from its HTML.
//! Markup drifts, so every field is looked up through an ordered chain of
//! strategies (see [`strategies`]); the first one that produces a non-empty
//! value wins. Fields fail independently: a page with no market cap still
//! yields its name, image, and description.
//!
//! Extracted values are assembled into a [`RawRecord`] using the
//! [`scraped_keys`] names, ready for [`crate::token::canonicalize`].

mod numeric;
pub mod strategies;

pub use numeric::parse_numeric;
pub use strategies::Strategy;

use crate::token::{scraped_keys, RawRecord};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// A field the extraction chain knows how to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Identifier,
    MarketCap,
    Description,
    Image,
    Holders,
}

impl Field {
    /// All fields in extraction order
    pub fn all() -> [Field; 6] {
        [
            Field::Name,
            Field::Identifier,
            Field::MarketCap,
            Field::Description,
            Field::Image,
            Field::Holders,
        ]
    }

    /// Fields read from a listing card
    ///
    /// Holder counts are only shown on a token's own page; anything a card
    /// calls "holders" is not that number.
    pub fn listing() -> [Field; 5] {
        [
            Field::Name,
            Field::Identifier,
            Field::MarketCap,
            Field::Description,
            Field::Image,
        ]
    }

    /// The ordered strategy chain for this field
    pub fn strategies(&self) -> &'static [Strategy] {
        match self {
            Field::Name => strategies::NAME,
            Field::Identifier => strategies::IDENTIFIER,
            Field::MarketCap => strategies::MARKET_CAP,
            Field::Description => strategies::DESCRIPTION,
            Field::Image => strategies::IMAGE,
            Field::Holders => strategies::HOLDERS,
        }
    }

    /// Returns true for fields parsed as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Field::MarketCap | Field::Holders)
    }

    /// Key under which the field is stored in a scraped [`RawRecord`]
    pub fn record_key(&self) -> &'static str {
        match self {
            Field::Name => scraped_keys::NAME,
            Field::Identifier => scraped_keys::IDENTIFIER,
            Field::MarketCap => scraped_keys::MARKET_CAP,
            Field::Description => scraped_keys::DESCRIPTION,
            Field::Image => scraped_keys::IMAGE,
            Field::Holders => scraped_keys::HOLDERS,
        }
    }
}

/// Runs the strategy chain for one field
///
/// Returns the first non-empty value, or None if every strategy missed.
pub fn extract_field(fragment: ElementRef<'_>, field: Field) -> Option<String> {
    for strategy in field.strategies() {
        if let Some(value) = (strategy.run)(fragment) {
            let value = value.trim();
            if !value.is_empty() {
                tracing::trace!(?field, strategy = strategy.name, "Extraction strategy matched");
                return Some(value.to_string());
            }
        }
    }

    tracing::debug!(?field, "No extraction strategy matched");
    None
}

/// Extracts every known field from a fragment into a scraped record
///
/// Text fields are stored as found. Numeric fields have their text reduced to
/// digits before parsing; a value that still does not parse is dropped with a
/// warning and the canonical default applies. If no identifier strategy
/// matches, `identifier_hint` is used instead.
///
/// # Arguments
///
/// * `fragment` - The element to search (a token card or a whole document)
/// * `identifier_hint` - Identifier known from context, such as the URL path
pub fn extract_record(fragment: ElementRef<'_>, identifier_hint: Option<&str>) -> RawRecord {
    extract_fields(fragment, &Field::all(), identifier_hint)
}

/// Same as [`extract_record`], restricted to `fields`
fn extract_fields(
    fragment: ElementRef<'_>,
    fields: &[Field],
    identifier_hint: Option<&str>,
) -> RawRecord {
    let mut record = RawRecord::new();

    for &field in fields {
        let value = extract_field(fragment, field);

        match (field, value) {
            (Field::Identifier, None) => {
                if let Some(hint) = identifier_hint.map(str::trim).filter(|h| !h.is_empty()) {
                    record.insert(field.record_key(), hint);
                }
            }
            (_, None) => {}
            (field, Some(text)) if field.is_numeric() => match parse_numeric(&text) {
                Some(number) => record.insert(field.record_key(), number),
                None => {
                    tracing::warn!(?field, text = %text, "Could not parse numeric field, using default");
                }
            },
            (field, Some(text)) => record.insert(field.record_key(), text),
        }
    }

    record
}

/// Extracts a token detail page
///
/// The `identifier` the page was requested under always wins over anything
/// the page links to; detail pages routinely link to other tokens.
pub fn extract_detail(html: &str, identifier: &str) -> RawRecord {
    let document = Html::parse_document(html);
    let mut record = extract_record(document.root_element(), None);

    let identifier = identifier.trim();
    if !identifier.is_empty() {
        let found = record.text(scraped_keys::IDENTIFIER);
        if !found.is_empty() && found != identifier {
            tracing::debug!(requested = identifier, found = %found, "Page identifier differs from request");
        }
        record.insert(scraped_keys::IDENTIFIER, identifier);
    }

    record
}

/// Splits a listing page into one fragment per token
///
/// Tries explicit token cards first and falls back to every link that points
/// at a token page.
pub fn split_listing(document: &Html) -> Vec<ElementRef<'_>> {
    const CARD_SELECTORS: [&str; 2] = ["[data-testid='token-card']", "a[href*='/board/']"];

    for css in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let cards: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if !cards.is_empty() {
            tracing::debug!(selector = css, count = cards.len(), "Split listing page");
            return cards;
        }
    }

    Vec::new()
}

/// Extracts every token on a listing page, in page order
///
/// Fragments without an identifier are skipped, and repeated identifiers
/// (a card often links to its token more than once) keep only the first.
pub fn extract_listing(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for fragment in split_listing(&document) {
        let record = extract_fields(fragment, &Field::listing(), None);
        let identifier = record.text(scraped_keys::IDENTIFIER);
        if identifier.is_empty() {
            tracing::debug!("Skipping listing fragment without identifier");
            continue;
        }
        if seen.insert(identifier) {
            records.push(record);
        }
    }

    records
}
