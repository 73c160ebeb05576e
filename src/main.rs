//! Product Archiver main entry point
//!
//! This is the command-line interface for the product archiver.

use anyhow::Context;
use clap::Parser;
use product_archiver::config::{load_config_with_hash, validate, Config};
use product_archiver::crawler::run_pipeline;
use product_archiver::output::print_report;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Product Archiver: scrape product pages into a zip archive
///
/// Fetches each product page, extracts its data, downloads its gallery and
/// writes everything into one archive with a directory per product.
#[derive(Parser, Debug)]
#[command(name = "product-archiver")]
#[command(version = "1.0.0")]
#[command(about = "Scrape product pages into a zip archive", long_about = None)]
struct Cli {
    /// Product page URLs
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Archive path, overriding the configuration
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(output) = &cli.output {
        config.output.archive_path = output.to_string_lossy().to_string();
    }
    validate(&config)?;

    let mut urls = cli.urls.clone();
    if let Some(input) = &cli.input {
        urls.extend(read_url_file(input)?);
    }

    if cli.dry_run {
        handle_dry_run(&config, &urls);
    } else {
        handle_run(&config, &urls).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("product_archiver=info,warn"),
            1 => EnvFilter::new("product_archiver=debug,info"),
            2 => EnvFilter::new("product_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Reads product URLs from a file; blank lines and `#` comments are skipped
fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Handles the --dry-run mode: shows the effective configuration and URLs
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== Product Archiver Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Page concurrency: {}", config.scraper.page_concurrency);
    println!("  Image concurrency: {}", config.scraper.image_concurrency);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);

    println!("\nOutput:");
    println!("  Archive: {}", config.output.archive_path);
    println!("  Compression level: {}", config.output.compression_level);

    println!("\nProduct URLs ({}):", urls.len());
    for url in urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main archiving run
async fn handle_run(config: &Config, urls: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if urls.is_empty() {
        tracing::warn!("No product URLs given; writing an empty archive");
    }

    match run_pipeline(config, urls).await {
        Ok(report) => {
            tracing::info!(
                "Run completed: {} of {} products archived",
                report.successes(),
                report.url_count
            );
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
