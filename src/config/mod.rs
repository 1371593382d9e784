//! Configuration module for Token-Board
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! All keys are optional; anything missing falls back to the built-in defaults.
//!
//! # Example
//!
//! ```no_run
//! use token_board::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("token-board.toml")).unwrap();
//! println!("Fresh TTL: {}s", config.cache.fresh_ttl_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CacheConfig, CollectorConfig, Config, FetcherConfig, UpstreamConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
