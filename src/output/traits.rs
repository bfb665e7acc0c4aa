//! Output error and report types
//!
//! This module defines the error type shared by every output writer and the
//! [`CrawlReport`] a finished crawl returns.

use crate::state::PageState;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary statistics for a finished crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Terminal state of every fetched frontier entry
    pub pages_by_state: HashMap<PageState, u64>,

    /// Distinct canonical URLs queued during the crawl
    pub urls_visited: u64,

    /// Fetch attempts that produced a response or error
    pub fetch_attempts: u64,

    /// Links accepted into the frontier
    pub links_queued: u64,

    /// Transient failures that were retried
    pub retries: u64,

    /// Products delivered to the handler
    pub products_emitted: u64,

    /// Emitted products with a non-zero discount
    pub discounted_products: u64,

    /// Follow-ups that arrived with no stored product
    pub correlation_misses: u64,

    /// Follow-ups whose payload could not be decoded
    pub malformed_follow_ups: u64,

    /// Discounted products finished from static fields because their
    /// follow-up was skipped or never answered
    pub failed_follow_ups: u64,

    /// Wall-clock duration of the crawl
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages that ended in the given state
    pub fn count(&self, state: PageState) -> u64 {
        self.pages_by_state.get(&state).copied().unwrap_or(0)
    }

    pub fn pages_processed(&self) -> u64 {
        self.count(PageState::Processed)
    }

    /// Number of pages that were logged and skipped
    pub fn pages_skipped(&self) -> u64 {
        self.pages_by_state
            .iter()
            .filter(|(state, _)| state.is_skipped())
            .map(|(_, count)| count)
            .sum()
    }

    /// Returns the total number of pages in terminal states
    pub fn total_terminal_pages(&self) -> u64 {
        self.pages_by_state.values().sum()
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.pages_processed() as f64 / terminal as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_report_new() {
        let report = CrawlReport::new();
        assert_eq!(report.products_emitted, 0);
        assert_eq!(report.total_terminal_pages(), 0);
        assert_eq!(report.success_rate(), 0.0);
    }

    #[test]
    fn test_counts_by_state() {
        let mut report = CrawlReport::new();
        report.pages_by_state.insert(PageState::Processed, 8);
        report.pages_by_state.insert(PageState::ClientError, 1);
        report.pages_by_state.insert(PageState::ErrorPage, 1);

        assert_eq!(report.pages_processed(), 8);
        assert_eq!(report.pages_skipped(), 2);
        assert_eq!(report.count(PageState::Fatal), 0);
        assert_eq!(report.total_terminal_pages(), 10);
        assert!((report.success_rate() - 80.0).abs() < 0.01);
    }
}
