use crate::config::types::{CacheConfig, CollectorConfig, Config, FetcherConfig, UpstreamConfig};
use crate::ConfigError;
use url::Url;

/// Largest page the listing API will honour
const MAX_PAGE_SIZE: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_upstream_config(&config.upstream)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_collector_config(&config.collector)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

/// Validates upstream endpoints and identification headers
fn validate_upstream_config(config: &UpstreamConfig) -> Result<(), ConfigError> {
    validate_http_url("api-url", &config.api_url)?;
    validate_http_url("site-url", &config.site_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher retry and transport settings
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.backoff_base_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed max-backoff-ms ({})",
            config.backoff_base_ms, config.max_backoff_ms
        )));
    }

    if config.request_timeout_ms == 0 || config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-ms and request-timeout-ms must be > 0".to_string(),
        ));
    }

    if config.max_connections < 1 {
        return Err(ConfigError::Validation(format!(
            "max-connections must be >= 1, got {}",
            config.max_connections
        )));
    }

    Ok(())
}

/// Validates pagination settings
fn validate_collector_config(config: &CollectorConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    let order = config.order.to_ascii_uppercase();
    if order != "ASC" && order != "DESC" {
        return Err(ConfigError::Validation(format!(
            "order must be ASC or DESC, got '{}'",
            config.order
        )));
    }

    if config.sort.trim().is_empty() {
        return Err(ConfigError::Validation("sort cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates cache thresholds
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.fresh_ttl_secs >= config.fallback_ceiling_secs {
        return Err(ConfigError::Validation(format!(
            "fresh-ttl-secs ({}) must be smaller than fallback-ceiling-secs ({})",
            config.fresh_ttl_secs, config.fallback_ceiling_secs
        )));
    }

    Ok(())
}

/// Validates that a URL parses and uses an HTTP scheme
fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            key, value
        )));
    }

    Ok(())
}
