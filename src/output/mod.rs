//! Output module for product records and crawl reports
//!
//! This module handles:
//! - Writing products as markdown plus raw JSON into bucket directories
//! - Loading product records back for the page generator
//! - Append-only diagnostic logs
//! - Crawl and data directory statistics

pub mod diagnostics;
pub mod json;
mod markdown;
pub mod stats;
mod traits;
pub mod writer;

pub use diagnostics::DiagnosticLog;
pub use json::{decode_product, encode_product, load_products_from_dir};
pub use markdown::format_product_markdown;
pub use stats::{load_data_dir_stats, print_data_dir_stats, print_report, DataDirStats};
pub use traits::{CrawlReport, OutputError, OutputResult};
pub use writer::{prepare_output_dir, DirectoryWriter};
