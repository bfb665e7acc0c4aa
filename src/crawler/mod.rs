//! Crawler module for fetching and processing catalog pages
//!
//! This module contains the crawl engine, including:
//! - The frontier of pending URLs and its visited set
//! - Politeness pacing, backoff and the retry budget
//! - HTTP transport, redirect policy and response cache
//! - Page classification and two-phase product resolution
//! - The result sink and the worker pool that ties it together

pub mod cache;
pub mod classifier;
mod coordinator;
pub mod fetcher;
pub mod frontier;
pub mod parser;
pub mod politeness;
pub mod resolver;
pub mod sink;

pub use cache::CachingTransport;
pub use classifier::{PageClassifier, PageOutcome};
pub use coordinator::Crawler;
pub use fetcher::{
    build_http_client, ErrorPageRedirectPolicy, FetchRequest, FetchResponse, HttpTransport,
    RedirectAction, RedirectPolicy, Transport, TransportError,
};
pub use frontier::{EnqueueOutcome, Frontier, FrontierEntry};
pub use politeness::{PolitenessGovernor, RetryDecision};
pub use resolver::{FollowUpStep, ProductResolver, ProductStep};
pub use sink::{ProductHandler, ResultSink};

pub use crate::output::CrawlReport;
