//! Dealz: a polite catalog crawler for discounted products
//!
//! This crate crawls a single catalog site, follows its home/category/product
//! page topology, stitches each product's static page together with its
//! discount follow-up fetch, and hands one finished record per product to a
//! caller-supplied handler.

pub mod config;
pub mod crawler;
pub mod output;
pub mod product;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
///
/// Every variant that reaches the caller of [`crawler::Crawler::run`] is
/// fatal: skips and transient failures are handled inside the crawl.
#[derive(Debug, Error)]
pub enum DealzError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Max retries ({max_retries}) exceeded for {url}: {last_error}")]
    RetryBudgetExceeded {
        url: String,
        max_retries: u32,
        last_error: String,
    },

    #[error(
        "Product identifier mismatch for {url}: requested prodId={requested_prod}&catId={requested_cat}, \
         page contains prodId={found_prod}&catId={found_cat}"
    )]
    IntegrityMismatch {
        url: String,
        requested_prod: String,
        requested_cat: String,
        found_prod: String,
        found_cat: String,
    },

    #[error("Start URL {url} cannot be crawled: {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("Crawl worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, DealzError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Crawler, CrawlReport};
pub use product::{CorrelationKey, PartialProduct, ResolvedProduct};
pub use url::{canonicalize_url, CrawlScope, PageKind};
