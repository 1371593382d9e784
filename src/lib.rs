//! Token-Board: a resilient acquisition pipeline for ranked token listings
//!
//! This crate fetches the market-cap ranked token board from an upstream that is
//! sometimes rate limited, sometimes down, and sometimes only reachable as HTML.
//! Results are normalized into [`CanonicalToken`] records and held in a
//! two-tier cache that keeps serving old data when the upstream disappears.

pub mod cache;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod service;
pub mod token;

use thiserror::Error;

/// Main error type for Token-Board operations
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Upstream unavailable and no cached data: {reason}")]
    Unavailable { reason: String },

    #[error("Token not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },

    #[error("Token identifier cannot be empty")]
    InvalidIdentifier,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Token-Board operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheRead, Freshness, ReadSource, TokenCache};
pub use config::Config;
pub use service::{TokenListing, TokenService};
pub use token::{canonicalize, CanonicalToken, RawRecord, SourceKind};
