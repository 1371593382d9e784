//! Token-Board main entry point
//!
//! This is the command-line front end for the token board pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use token_board::config::{load_config_with_hash, validate, Config};
use token_board::{ReadSource, TokenService};
use tracing_subscriber::EnvFilter;

/// Token-Board: ranked token listings from a flaky upstream
///
/// Token-Board collects the market-cap ranked token board, falling back to
/// scraping HTML when the API is unusable and to cached data when the
/// upstream is unreachable. Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "token-board")]
#[command(version = "1.0.0")]
#[command(about = "Ranked token listings with retry, scraping, and cache fallback", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the top tokens by market cap
    List {
        /// Number of tokens to return (1-1000)
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Ignore a fresh cache and go to the upstream
        #[arg(long)]
        force_refresh: bool,
    },

    /// Show a single token
    Token {
        /// Token identifier (mint address)
        identifier: String,
    },

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_ref())?;

    match cli.command {
        Command::List {
            limit,
            force_refresh,
        } => handle_list(config, limit, force_refresh).await,
        Command::Token { identifier } => handle_token(config, &identifier).await,
        Command::CheckConfig => handle_check_config(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout stays valid JSON.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("token_board=info,warn"),
            1 => EnvFilter::new("token_board=debug,info"),
            2 => EnvFilter::new("token_board=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file if one was given, otherwise the validated defaults
fn load(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            let config = Config::default();
            validate(&config).context("Default configuration is invalid")?;
            tracing::debug!("No configuration file given, using defaults");
            Ok(config)
        }
    }
}

async fn handle_list(config: Config, limit: usize, force_refresh: bool) -> anyhow::Result<()> {
    let service = TokenService::new(config)?;
    let listing = service.list_tokens(limit, force_refresh).await?;

    let (source, stale_secs) = match listing.source {
        ReadSource::Fresh => ("cache", None),
        ReadSource::Refreshed => ("upstream", None),
        ReadSource::Fallback { age, .. } => ("stale-cache", Some(age.num_seconds())),
    };

    let output = json!({
        "count": listing.tokens.len(),
        "last_updated": listing.last_updated.to_rfc3339(),
        "source": source,
        "stale_seconds": stale_secs,
        "tokens": listing.tokens,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn handle_token(config: Config, identifier: &str) -> anyhow::Result<()> {
    let service = TokenService::new(config)?;
    let token = service.get_token(identifier).await?;
    println!("{}", serde_json::to_string_pretty(&token)?);
    Ok(())
}

/// Prints the effective configuration
fn handle_check_config(config: &Config) -> anyhow::Result<()> {
    println!("=== Token-Board Configuration ===\n");

    println!("Upstream:");
    println!("  API URL: {}", config.upstream.api_url);
    println!("  Site URL: {}", config.upstream.site_url);
    println!("  User agent: {}", config.upstream.user_agent);

    println!("\nFetcher:");
    println!("  Max attempts: {}", config.fetcher.max_retries);
    println!(
        "  Backoff: {}ms base, {}ms cap",
        config.fetcher.backoff_base_ms, config.fetcher.max_backoff_ms
    );
    println!(
        "  Timeouts: {}ms connect, {}ms request",
        config.fetcher.connect_timeout_ms, config.fetcher.request_timeout_ms
    );
    println!("  Max connections: {}", config.fetcher.max_connections);

    println!("\nCollector:");
    println!("  Page size: {}", config.collector.page_size);
    println!(
        "  Order: {} {}",
        config.collector.sort, config.collector.order
    );
    println!("  Include NSFW: {}", config.collector.include_nsfw);
    match config.collector.collection_deadline() {
        Some(deadline) => println!("  Deadline: {}s", deadline.as_secs()),
        None => println!("  Deadline: none"),
    }

    println!("\nCache:");
    println!("  Fresh TTL: {}s", config.cache.fresh_ttl_secs);
    println!("  Fallback ceiling: {}s", config.cache.fallback_ceiling_secs);

    println!("\nConfiguration is valid.");
    Ok(())
}
