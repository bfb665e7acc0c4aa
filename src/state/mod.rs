//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: lifecycle of a frontier entry (queued, fetching, processed, skipped, ...)
//! - `DomainState`: per-domain dispatch slots for politeness pacing
//! - `ResolutionState`: lifecycle of a product through the resolver

mod domain_state;
mod page_state;
mod product_state;

// Re-export main types
pub use domain_state::DomainState;
pub use page_state::PageState;
pub use product_state::ResolutionState;
