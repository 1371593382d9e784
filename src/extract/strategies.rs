//! Ordered lookup rules for each extracted field
//!
//! Each table is a fixed priority list. A strategy is a pure function from an
//! HTML fragment to an optional, non-empty string; the chain runner in the
//! parent module takes the first hit.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

/// A single named lookup rule
#[derive(Clone, Copy)]
pub struct Strategy {
    /// Short label used in trace logs
    pub name: &'static str,

    /// The lookup itself
    pub run: fn(ElementRef<'_>) -> Option<String>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

pub const NAME: &[Strategy] = &[
    Strategy { name: "testid", run: name_testid },
    Strategy { name: "class", run: name_class },
    Strategy { name: "heading", run: name_heading },
    Strategy { name: "og-title", run: name_og_title },
    Strategy { name: "title", run: name_title },
    Strategy { name: "image-alt", run: name_image_alt },
];

pub const IDENTIFIER: &[Strategy] = &[
    Strategy { name: "self-href", run: identifier_self_href },
    Strategy { name: "board-link", run: identifier_board_link },
    Strategy { name: "data-mint", run: identifier_data_attr },
    Strategy { name: "canonical-link", run: identifier_canonical_link },
    Strategy { name: "og-url", run: identifier_og_url },
];

pub const MARKET_CAP: &[Strategy] = &[
    Strategy { name: "testid", run: market_cap_testid },
    Strategy { name: "data-attr", run: market_cap_data_attr },
    Strategy { name: "class", run: market_cap_class },
    Strategy { name: "label", run: market_cap_label },
];

pub const DESCRIPTION: &[Strategy] = &[
    Strategy { name: "testid", run: description_testid },
    Strategy { name: "class", run: description_class },
    Strategy { name: "meta-description", run: description_meta },
    Strategy { name: "og-description", run: description_og },
];

pub const IMAGE: &[Strategy] = &[
    Strategy { name: "testid", run: image_testid },
    Strategy { name: "og-image", run: image_og },
    Strategy { name: "first-img", run: image_first },
];

pub const HOLDERS: &[Strategy] = &[
    Strategy { name: "testid", run: holders_testid },
    Strategy { name: "data-attr", run: holders_data_attr },
    Strategy { name: "label", run: holders_label },
    Strategy { name: "trailing-label", run: holders_trailing_label },
];

static MARKET_CAP_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:market\s*cap|mcap)\b\s*:?\s*(.*)$").expect("valid regex")
});

static HOLDERS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*holders?\b\s*:?\s*(.*)$").expect("valid regex"));

static HOLDERS_TRAILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d[\d,]*)\s+holders\b").expect("valid regex"));

// ===== Shared helpers =====

/// Collapses all whitespace runs in an element's text into single spaces
pub(crate) fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first matching descendant that is not blank
fn select_text(fragment: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    fragment
        .select(&selector)
        .map(normalized_text)
        .find(|text| !text.is_empty())
}

/// Attribute value of the first matching descendant where it is not blank
fn select_attr(fragment: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    fragment
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Text nodes that are direct children of the element
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .flat_map(|text| text.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Finds a value announced by a text label
///
/// Looks for an element whose own text starts with the label. The value is
/// either the rest of that text ("Market cap: $4.2K") or, when the label
/// stands alone, the text of the next sibling element.
fn labelled_value(fragment: ElementRef<'_>, label: &Regex) -> Option<String> {
    let selector = Selector::parse("*").ok()?;

    for element in fragment.select(&selector) {
        let text = own_text(element);
        let Some(captures) = label.captures(&text) else {
            continue;
        };

        let inline = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if inline.chars().any(|c| c.is_ascii_digit()) {
            return Some(inline.to_string());
        }

        let sibling = element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .map(normalized_text)
            .next();
        if let Some(value) = sibling.filter(|v| v.chars().any(|c| c.is_ascii_digit())) {
            return Some(value);
        }
    }

    None
}

/// Pulls the token identifier out of a `/board/{id}` or `/coin/{id}` link
pub(crate) fn identifier_from_href(href: &str) -> Option<String> {
    let rest = ["/board/", "/coin/"]
        .iter()
        .find_map(|marker| href.find(*marker).map(|idx| &href[idx + marker.len()..]))?;

    let identifier = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .trim();

    (!identifier.is_empty()).then(|| identifier.to_string())
}

// ===== Name =====

fn name_testid(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, "[data-testid='token-name']")
}

fn name_class(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, ".token-name")
}

fn name_heading(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, "h1")
}

fn name_og_title(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "meta[property='og:title']", "content")
}

fn name_title(fragment: ElementRef<'_>) -> Option<String> {
    let title = select_text(fragment, "title")?;
    let name = title.split(" | ").next().unwrap_or("").trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn name_image_alt(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "img[alt]", "alt")
}

// ===== Identifier =====

fn identifier_self_href(fragment: ElementRef<'_>) -> Option<String> {
    fragment.value().attr("href").and_then(identifier_from_href)
}

fn identifier_board_link(fragment: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    fragment
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .find_map(identifier_from_href)
}

fn identifier_data_attr(fragment: ElementRef<'_>) -> Option<String> {
    fragment
        .value()
        .attr("data-mint")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| select_attr(fragment, "[data-mint]", "data-mint"))
}

fn identifier_canonical_link(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "link[rel='canonical']", "href")
        .as_deref()
        .and_then(identifier_from_href)
}

fn identifier_og_url(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "meta[property='og:url']", "content")
        .as_deref()
        .and_then(identifier_from_href)
}

// ===== Market cap =====

fn market_cap_testid(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, "[data-testid='market-cap']")
}

fn market_cap_data_attr(fragment: ElementRef<'_>) -> Option<String> {
    fragment
        .value()
        .attr("data-market-cap")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| select_attr(fragment, "[data-market-cap]", "data-market-cap"))
}

fn market_cap_class(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, ".market-cap")
}

fn market_cap_label(fragment: ElementRef<'_>) -> Option<String> {
    labelled_value(fragment, &MARKET_CAP_LABEL)
}

// ===== Description =====

fn description_testid(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, "[data-testid='token-description']")
}

fn description_class(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, ".token-description")
}

fn description_meta(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "meta[name='description']", "content")
}

fn description_og(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "meta[property='og:description']", "content")
}

// ===== Image =====

fn image_testid(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "img[data-testid='token-image']", "src")
}

fn image_og(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "meta[property='og:image']", "content")
}

fn image_first(fragment: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    fragment
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
        .map(str::to_string)
}

// ===== Holders =====

fn holders_testid(fragment: ElementRef<'_>) -> Option<String> {
    select_text(fragment, "[data-testid='holder-count']")
}

fn holders_data_attr(fragment: ElementRef<'_>) -> Option<String> {
    select_attr(fragment, "[data-holders]", "data-holders")
}

fn holders_label(fragment: ElementRef<'_>) -> Option<String> {
    labelled_value(fragment, &HOLDERS_LABEL)
}

fn holders_trailing_label(fragment: ElementRef<'_>) -> Option<String> {
    let text = normalized_text(fragment);
    HOLDERS_TRAILING
        .captures(&text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
