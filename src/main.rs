//! Dealz main entry point
//!
//! This is the command-line interface for the catalog deal crawler.

use anyhow::{Context, Result};
use clap::Parser;
use dealz_scraper::config::{load_config, validate, Config};
use dealz_scraper::crawler::Crawler;
use dealz_scraper::output::{
    load_data_dir_stats, print_data_dir_stats, print_report, DiagnosticLog, DirectoryWriter,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Dealz: a polite catalog deal crawler
///
/// Crawls the catalog from its home page through every category to every
/// product, fetches discount tiers for discounted products, and writes one
/// markdown + JSON record per product into percentage buckets.
#[derive(Parser, Debug)]
#[command(name = "dealz-scraper")]
#[command(version)]
#[command(about = "A polite catalog deal crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Catalog page to start from
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Directory product records are written to
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Wipe and reuse the data directory instead of a timestamped subdirectory
    #[arg(long)]
    overwrite: bool,

    /// Cache successful responses on disk
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Write links/urls/scraped diagnostic logs to this directory
    #[arg(long, value_name = "DIR")]
    diagnostics_dir: Option<PathBuf>,

    /// Number of crawl workers
    #[arg(short = 't', long)]
    threads: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics for an existing data directory and exit
    #[arg(long, value_name = "DIR")]
    stats: Option<PathBuf>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Some(dir) = &cli.stats {
        return handle_stats(dir);
    }

    let config = build_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dealz_scraper=info,warn"),
            1 => EnvFilter::new("dealz_scraper=debug,info"),
            2 => EnvFilter::new("dealz_scraper=trace,debug"),
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

/// Loads the config file (if any), applies command-line overrides and validates
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(url) = &cli.start_url {
        config.site.start_url = url.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.output.data_dir = dir.clone();
    }
    if cli.overwrite {
        config.output.overwrite = true;
    }
    if let Some(dir) = &cli.cache_dir {
        config.output.cache_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.diagnostics_dir {
        config.output.diagnostics_dir = Some(dir.clone());
    }
    if let Some(threads) = cli.threads {
        config.crawler.threads = threads;
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Dealz Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Threads: {}", config.crawler.threads);
    println!("  Ordering: {:?}", config.crawler.ordering);
    println!(
        "  Delay: {}ms + up to {}ms jitter",
        config.crawler.delay_ms, config.crawler.random_delay_ms
    );
    println!(
        "  Retries: {} (backoff {}^n x {}ms, capped at {}ms)",
        config.crawler.max_retries,
        config.crawler.backoff_base,
        config.crawler.backoff_unit_ms,
        config.crawler.backoff_cap_ms
    );
    println!("  Max redirects: {}", config.crawler.max_redirects);

    println!("\nSite:");
    println!("  Start URL: {}", config.site.start_url);
    println!("  Allowed domains: {:?}", config.site.allowed_domains);
    println!("  User agent: {}", config.site.user_agent);

    println!("\nOutput:");
    println!("  Data dir: {}", config.output.data_dir.display());
    println!("  Overwrite: {}", config.output.overwrite);
    if let Some(dir) = config.output.cache_dir() {
        println!("  Cache dir: {}", dir.display());
    }
    if let Some(dir) = config.output.diagnostics_dir() {
        println!("  Diagnostics dir: {}", dir.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: summarizes an existing data directory
fn handle_stats(dir: &Path) -> Result<()> {
    println!("Data directory: {}\n", dir.display());

    let stats = load_data_dir_stats(dir)
        .with_context(|| format!("failed to read products from {}", dir.display()))?;
    print_data_dir_stats(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<()> {
    let writer = DirectoryWriter::create(&config.output.data_dir, config.output.overwrite)
        .context("failed to prepare data directory")?;
    tracing::info!("Writing products to {}", writer.root().display());

    let mut crawler = Crawler::from_config(&config, Box::new(writer))?;
    if let Some(dir) = config.output.diagnostics_dir() {
        let diagnostics = DiagnosticLog::open(dir)
            .with_context(|| format!("failed to open diagnostic logs in {}", dir.display()))?;
        crawler = crawler.with_diagnostics(diagnostics);
    }

    match crawler.run(&config.site.start_url).await {
        Ok(report) => {
            tracing::info!("Crawl completed successfully");
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
