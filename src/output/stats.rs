//! Statistics for crawls and data directories
//!
//! This module prints the [`CrawlReport`] of a finished crawl and summarizes
//! an existing data directory by discount bucket.

use crate::output::json::load_products_from_dir;
use crate::output::traits::{CrawlReport, OutputResult};
use crate::output::writer::bucket_name;
use crate::state::PageState;
use std::collections::BTreeMap;
use std::path::Path;

/// Summary of the product records in a data directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataDirStats {
    /// Total number of product records
    pub total_products: usize,

    /// Records per bucket (`25%`, `other`, ...)
    pub by_bucket: BTreeMap<String, usize>,

    /// Records without a parseable price
    pub missing_price: usize,

    /// Largest percentage off among the records
    pub best_discount: f64,
}

/// Loads statistics for every record under `dir`
pub fn load_data_dir_stats(dir: &Path) -> OutputResult<DataDirStats> {
    let products = load_products_from_dir(dir)?;

    let mut stats = DataDirStats {
        total_products: products.len(),
        ..Default::default()
    };
    for product in &products {
        *stats.by_bucket.entry(bucket_name(product)).or_insert(0) += 1;
        if product.price.is_none() {
            stats.missing_price += 1;
        }
        stats.best_discount = stats.best_discount.max(product.percentage);
    }

    Ok(stats)
}

/// Prints data directory statistics to stdout
pub fn print_data_dir_stats(stats: &DataDirStats) {
    println!("=== Product Statistics ===\n");
    println!("  Total products: {}", stats.total_products);
    println!("  Without price: {}", stats.missing_price);
    println!("  Best discount: {}%", stats.best_discount);
    println!();

    println!("Products by Bucket:");
    // Sort buckets by count (descending)
    let mut buckets: Vec<_> = stats.by_bucket.iter().collect();
    buckets.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (bucket, count) in buckets {
        println!("  {}: {}", bucket, count);
    }
}

/// Prints a crawl report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  URLs visited: {}", report.urls_visited);
    println!("  Fetch attempts: {}", report.fetch_attempts);
    println!("  Links queued: {}", report.links_queued);
    println!("  Retries: {}", report.retries);
    println!("  Duration: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Pages by State:");
    for state in PageState::terminal_states() {
        let count = report.count(state);
        if count > 0 {
            println!("  {}: {}", state, count);
        }
    }
    println!();

    println!("Products:");
    println!("  Emitted: {}", report.products_emitted);
    println!("  Discounted: {}", report.discounted_products);
    println!("  Correlation misses: {}", report.correlation_misses);
    println!("  Malformed follow-ups: {}", report.malformed_follow_ups);
    println!("  Failed follow-ups: {}", report.failed_follow_ups);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        report.success_rate(),
        report.pages_processed(),
        report.total_terminal_pages()
    );
}
