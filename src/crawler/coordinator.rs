//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a crawl:
//! - Seeding the frontier with the start URL
//! - Running `threads` workers that fetch, classify and act on pages
//! - Retrying transient failures and skipping permanent ones
//! - Escalating fatal errors and stopping every worker
//! - Collecting the final [`CrawlReport`]

use crate::config::Config;
use crate::crawler::cache::CachingTransport;
use crate::crawler::classifier::{PageClassifier, PageOutcome};
use crate::crawler::fetcher::{FetchRequest, FetchResponse, HttpTransport, Transport, TransportError};
use crate::crawler::frontier::{EnqueueOutcome, Frontier, FrontierEntry};
use crate::crawler::politeness::{PolitenessGovernor, RetryDecision};
use crate::crawler::resolver::{FollowUpStep, ProductResolver, ProductStep};
use crate::crawler::sink::{ProductHandler, ResultSink};
use crate::output::{CrawlReport, DiagnosticLog};
use crate::product::{CorrelationKey, ResolvedProduct};
use crate::state::PageState;
use crate::url::{canonicalize_url, CrawlScope, PageKind};
use crate::DealzError;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;

/// Running counters, folded into a [`CrawlReport`] at the end
#[derive(Debug, Default)]
struct CrawlCounters {
    pages_by_state: Mutex<HashMap<PageState, u64>>,
    fetch_attempts: AtomicU64,
    links_queued: AtomicU64,
    retries: AtomicU64,
    products_emitted: AtomicU64,
    discounted_products: AtomicU64,
}

impl CrawlCounters {
    fn record(&self, state: PageState) {
        *self.pages_by_state.lock().unwrap().entry(state).or_insert(0) += 1;
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything the workers share
struct CrawlContext {
    frontier: Frontier,
    governor: PolitenessGovernor,
    transport: Arc<dyn Transport>,
    classifier: PageClassifier,
    resolver: Arc<ProductResolver>,
    sink: ResultSink,
    diagnostics: Option<DiagnosticLog>,
    headers: BTreeMap<String, String>,
    counters: CrawlCounters,
}

/// A configured, single-use crawl
///
/// # Example
///
/// ```no_run
/// use dealz_scraper::config::Config;
/// use dealz_scraper::crawler::Crawler;
/// use dealz_scraper::output::DirectoryWriter;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let writer = DirectoryWriter::create(Path::new("./data"), false)?;
/// let crawler = Crawler::from_config(&config, Box::new(writer))?;
/// let report = crawler.run(&config.site.start_url).await?;
/// println!("{} products", report.products_emitted);
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    context: Arc<CrawlContext>,
    threads: usize,
}

impl Crawler {
    /// Creates a crawler fetching through the given transport
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        handler: Box<dyn ProductHandler>,
    ) -> Self {
        let scope = CrawlScope::new(config.site.allowed_domains.clone());
        let resolver = Arc::new(ProductResolver::new());

        let context = CrawlContext {
            frontier: Frontier::new(scope.clone(), config.crawler.ordering),
            governor: PolitenessGovernor::new(&config.crawler),
            transport,
            classifier: PageClassifier::new(scope, Arc::clone(&resolver)),
            resolver,
            sink: ResultSink::new(handler),
            diagnostics: None,
            headers: config
                .site
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            counters: CrawlCounters::default(),
        };

        Self {
            context: Arc::new(context),
            threads: config.crawler.threads.max(1) as usize,
        }
    }

    /// Creates a crawler with the HTTP transport described by `config`
    ///
    /// Responses are cached on disk when an output cache directory is set.
    pub fn from_config(config: &Config, handler: Box<dyn ProductHandler>) -> Result<Self, DealzError> {
        let http = HttpTransport::from_config(&config.site, config.crawler.max_redirects)?;

        let transport: Arc<dyn Transport> = match config.output.cache_dir() {
            Some(dir) => {
                tracing::info!("Caching responses in {}", dir.display());
                Arc::new(CachingTransport::new(http, dir))
            }
            None => Arc::new(http),
        };

        Ok(Self::new(config, transport, handler))
    }

    /// Enables the append-only diagnostic logs
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticLog) -> Self {
        match Arc::get_mut(&mut self.context) {
            Some(context) => context.diagnostics = Some(diagnostics),
            None => tracing::warn!("Crawler already shared; diagnostics not enabled"),
        }
        self
    }

    /// Runs the crawl to completion
    ///
    /// Returns once every reachable page has been processed. The first
    /// fatal error stops all workers and is returned instead of a report.
    pub async fn run(self, start_url: &str) -> Result<CrawlReport, DealzError> {
        let started = Instant::now();
        let context = self.context;

        match context.frontier.enqueue(start_url) {
            EnqueueOutcome::Queued => {}
            EnqueueOutcome::Malformed(reason) => {
                return Err(DealzError::InvalidStartUrl {
                    url: start_url.to_string(),
                    reason,
                })
            }
            other => {
                return Err(DealzError::InvalidStartUrl {
                    url: start_url.to_string(),
                    reason: format!("not a crawlable catalog page ({:?})", other),
                })
            }
        }

        tracing::info!("Starting crawl at {} with {} workers", start_url, self.threads);

        let mut workers = JoinSet::new();
        for id in 0..self.threads {
            let context = Arc::clone(&context);
            workers.spawn(async move { context.worker(id).await });
        }

        let mut fatal: Option<DealzError> = None;
        while let Some(joined) = workers.join_next().await {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => DealzError::Worker(e.to_string()),
            };

            if fatal.is_none() {
                tracing::error!("Stopping crawl: {}", error);
                context.frontier.close();
                context.governor.shutdown();
                workers.abort_all();
                fatal = Some(error);
            }
        }

        if let Some(error) = fatal {
            return Err(error);
        }

        // Follow-ups that never produced a response (e.g. redirected away)
        for product in context.resolver.drain_pending() {
            tracing::warn!(
                "No discount data arrived for {}; using static fields",
                product.url
            );
            context.emit(product)?;
        }

        let report = context.report(started);
        tracing::info!(
            "Crawl completed: {} products from {} pages in {:?}",
            report.products_emitted,
            report.pages_processed(),
            report.elapsed
        );
        Ok(report)
    }
}

impl CrawlContext {
    /// Worker loop: pull, process, mark done, until the frontier drains
    async fn worker(&self, id: usize) -> Result<(), DealzError> {
        tracing::debug!("Worker {} started", id);

        while let Some(entry) = self.frontier.next_entry().await {
            let result = self.process(entry).await;
            self.frontier.task_done();

            if let Err(e) = result {
                self.counters.record(PageState::Fatal);
                return Err(e);
            }
        }

        tracing::debug!("Worker {} finished", id);
        Ok(())
    }

    /// Fetches one frontier entry and acts on the response
    ///
    /// # Failure Handling
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Network error, timeout, HTTP 5xx, HTTP 429 | Retry with backoff; fatal once the budget is spent |
    /// | HTTP 4xx | Skip |
    /// | Redirect to the error page | Skip |
    /// | Redirect chain too long / unusable | Skip |
    async fn process(&self, entry: FrontierEntry) -> Result<(), DealzError> {
        if entry.attempts > 0 {
            tracing::info!("Retrying {} (attempt {})", entry.url, entry.attempts + 1);
        }

        let Some(permit) = self.governor.acquire(&entry.url).await else {
            // Governor shut down: the crawl is stopping
            return Ok(());
        };

        tracing::debug!("Visiting {}", entry.url);
        let request = FetchRequest::with_headers(entry.url.clone(), self.headers.clone());
        let result = self.transport.fetch(&request).await;
        drop(permit);
        CrawlCounters::bump(&self.counters.fetch_attempts);

        match result {
            Ok(response) if response.is_success() => {
                self.governor.record_success(entry.url.as_str());
                self.handle_page(&entry, response)
            }
            Ok(response) if response.status == 429 || response.status >= 500 => {
                self.retry(entry, format!("HTTP {}", response.status)).await
            }
            Ok(response) => {
                self.governor.record_success(entry.url.as_str());
                tracing::warn!("Skipping {}: HTTP {}", entry.url, response.status);
                let state = if (400..500).contains(&response.status) {
                    PageState::ClientError
                } else {
                    PageState::Unrecognized
                };
                self.counters.record(state);
                self.recover_follow_up(&entry)
            }
            Err(e) if e.is_transient() => self.retry(entry, e.to_string()).await,
            Err(e) => {
                self.governor.record_success(entry.url.as_str());
                tracing::warn!("Skipping {}: {}", entry.url, e);
                let state = match e {
                    TransportError::ErrorPageRedirect { .. } => PageState::ErrorPage,
                    _ => PageState::RedirectFailed,
                };
                self.counters.record(state);
                self.recover_follow_up(&entry)
            }
        }
    }

    /// Finishes a product from its static fields when its follow-up is skipped
    fn recover_follow_up(&self, entry: &FrontierEntry) -> Result<(), DealzError> {
        if entry.kind != PageKind::ProductFollowUp {
            return Ok(());
        }
        let Some(key) = CorrelationKey::from_url(&entry.url) else {
            return Ok(());
        };

        if let Some(product) = self.resolver.abandon_follow_up(&key) {
            tracing::warn!(
                "Discount data for {} unavailable; using static fields",
                key
            );
            self.emit(product)?;
        }
        Ok(())
    }

    /// Backs off and requeues an entry, or escalates once the budget is spent
    async fn retry(&self, entry: FrontierEntry, error: String) -> Result<(), DealzError> {
        match self.governor.record_failure(entry.url.as_str()) {
            RetryDecision::Retry { attempt, delay } => {
                tracing::warn!(
                    "Fetch of {} failed ({}); retry {} in {:?}",
                    entry.url,
                    error,
                    attempt,
                    delay
                );
                CrawlCounters::bump(&self.counters.retries);
                tokio::time::sleep(delay).await;
                self.frontier.requeue(FrontierEntry {
                    attempts: attempt,
                    ..entry
                });
                Ok(())
            }
            RetryDecision::Exhausted { attempts } => {
                tracing::error!("Giving up on {} after {} attempts: {}", entry.url, attempts, error);
                Err(DealzError::RetryBudgetExceeded {
                    url: entry.url.to_string(),
                    max_retries: self.governor.max_retries(),
                    last_error: error,
                })
            }
        }
    }

    /// Routes a successful response through the classifier
    fn handle_page(&self, entry: &FrontierEntry, response: FetchResponse) -> Result<(), DealzError> {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.record_url(entry.url.as_str())?;
        }

        let outcome = self.classifier.classify(&response.final_url, &response.body)?;

        match outcome {
            PageOutcome::Links { kind, links } => {
                tracing::debug!("{} {} has {} links", kind, response.final_url, links.len());
                for link in links {
                    self.submit_link(&link, response.final_url.as_str())?;
                }
            }
            PageOutcome::Product(ProductStep::Resolved(product)) => self.emit(product)?,
            PageOutcome::Product(ProductStep::AwaitingFollowUp { key, follow_up }) => {
                match self.frontier.enqueue(follow_up.as_str()) {
                    EnqueueOutcome::Queued => {
                        tracing::debug!("Fetching discounts for {}", key);
                    }
                    other => {
                        tracing::warn!(
                            "Follow-up {} for {} not queued ({:?}); using static fields",
                            follow_up,
                            key,
                            other
                        );
                        if let Some(product) = self.resolver.reclaim(&key) {
                            self.emit(product)?;
                        }
                    }
                }
            }
            PageOutcome::Product(ProductStep::Skipped(reason)) => {
                // Classifier maps this to PageOutcome::Skipped
                tracing::warn!("Skipping {}: {}", entry.url, reason);
                self.counters.record(PageState::Unrecognized);
                return Ok(());
            }
            PageOutcome::FollowUp(FollowUpStep::Resolved(product)) => self.emit(product)?,
            PageOutcome::FollowUp(FollowUpStep::Malformed { product, reason }) => {
                tracing::warn!(
                    "Malformed discount data at {}: {}; using static fields",
                    response.final_url,
                    reason
                );
                self.emit(product)?;
            }
            PageOutcome::FollowUp(FollowUpStep::CorrelationMiss(key)) => {
                tracing::warn!(
                    "Discount data for {} arrived with no stored product; dropped",
                    key
                );
            }
            PageOutcome::Skipped { kind, reason } => {
                tracing::warn!("Skipping {} {}: {}", kind, entry.url, reason);
                self.counters.record(PageState::Unrecognized);
                return self.recover_follow_up(entry);
            }
            PageOutcome::Ignored => {
                tracing::debug!("Ignoring {}: no known page shape", response.final_url);
                self.counters.record(PageState::OutOfScope);
                return self.recover_follow_up(entry);
            }
        }

        self.counters.record(PageState::Processed);
        Ok(())
    }

    /// Offers a discovered link to the frontier
    fn submit_link(&self, link: &str, source: &str) -> Result<(), DealzError> {
        match self.frontier.enqueue(link) {
            EnqueueOutcome::Queued => {
                CrawlCounters::bump(&self.counters.links_queued);
                tracing::debug!("Queued {}", link);

                if let Ok(url) = canonicalize_url(link) {
                    if self.classifier.kind_of(&url) == Some(PageKind::ProductDetail) {
                        self.resolver.discover(&url);
                    }
                }
                if let Some(diagnostics) = &self.diagnostics {
                    diagnostics.record_link(link, source)?;
                }
            }
            EnqueueOutcome::Malformed(reason) => {
                tracing::debug!("Dropping malformed link {:?} on {}: {}", link, source, reason);
            }
            EnqueueOutcome::AlreadyVisited | EnqueueOutcome::OutOfScope => {}
        }
        Ok(())
    }

    /// Hands a finished product to the sink
    fn emit(&self, product: ResolvedProduct) -> Result<(), DealzError> {
        let url = product.url.clone();
        let discounted = product.is_discounted();
        tracing::info!(
            "Found product: {} ({}% off) {}",
            product.name,
            product.percentage,
            url
        );

        if self.sink.emit(product)? {
            CrawlCounters::bump(&self.counters.products_emitted);
            if discounted {
                CrawlCounters::bump(&self.counters.discounted_products);
            }
            if let Some(diagnostics) = &self.diagnostics {
                diagnostics.record_scraped(&url)?;
            }
        }
        Ok(())
    }

    fn report(&self, started: Instant) -> CrawlReport {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        CrawlReport {
            pages_by_state: self.counters.pages_by_state.lock().unwrap().clone(),
            urls_visited: self.frontier.visited_count() as u64,
            fetch_attempts: load(&self.counters.fetch_attempts),
            links_queued: load(&self.counters.links_queued),
            retries: load(&self.counters.retries),
            products_emitted: load(&self.counters.products_emitted),
            discounted_products: load(&self.counters.discounted_products),
            correlation_misses: self.resolver.correlation_misses(),
            malformed_follow_ups: self.resolver.malformed_follow_ups(),
            failed_follow_ups: self.resolver.failed_follow_ups(),
            elapsed: started.elapsed(),
        }
    }
}
