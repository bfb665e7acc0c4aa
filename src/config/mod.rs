//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so a crawl can run without any file.
//!
//! # Example
//!
//! ```no_run
//! use dealz_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("dealz.toml")).unwrap();
//! println!("Crawling with {} workers", config.crawler.threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, FrontierOrdering, OutputConfig, SiteConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
