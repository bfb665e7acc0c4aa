//! Politeness governor for pacing requests
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-domain spacing: a fixed delay plus random jitter between dispatches
//! - Exponential backoff and the per-URL retry budget

use crate::config::CrawlerConfig;
use crate::state::DomainState;
use crate::url::extract_domain;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// What to do after a transient fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then fetch again; `attempt` counts failures so far
    Retry { attempt: u32, delay: Duration },
    /// The retry budget is spent; the failure is fatal
    Exhausted { attempts: u32 },
}

/// Paces requests and decides on retries
///
/// The governor coordinates:
/// - Global concurrency limits (at most `threads` fetches in flight)
/// - Per-domain dispatch slots, so concurrent workers stay spaced apart
/// - A failed-attempt counter per canonical URL
pub struct PolitenessGovernor {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Per-domain pacing state
    domains: Mutex<HashMap<String, DomainState>>,

    /// Failed attempts per canonical URL
    retries: Mutex<HashMap<String, u32>>,

    delay: Duration,
    random_delay: Duration,
    max_retries: u32,
    backoff_base: f64,
    backoff_unit: Duration,
    backoff_cap: Duration,
}

impl PolitenessGovernor {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.threads.max(1) as usize)),
            domains: Mutex::new(HashMap::new()),
            retries: Mutex::new(HashMap::new()),
            delay: config.delay(),
            random_delay: config.random_delay(),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            backoff_unit: config.backoff_unit(),
            backoff_cap: config.backoff_cap(),
        }
    }

    /// Waits until a request to `url` may be dispatched
    ///
    /// Acquires a global permit, then reserves the domain's next slot and
    /// sleeps until it. The fetch must be issued while the returned permit is
    /// held. Returns `None` only if the governor has been shut down.
    pub async fn acquire(&self, url: &Url) -> Option<OwnedSemaphorePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        let domain = extract_domain(url).unwrap_or_default();
        let wait = {
            let now = Instant::now();
            let mut domains = self.domains.lock().unwrap();
            let state = domains.entry(domain.clone()).or_insert_with(DomainState::new);
            let slot = state.reserve_slot(now, self.next_gap());
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before requesting {} from {}", wait, url, domain);
            tokio::time::sleep(wait).await;
        }

        Some(permit)
    }

    /// Chooses the gap that follows a dispatch: fixed delay plus jitter
    fn next_gap(&self) -> Duration {
        let jitter_ms = self.random_delay.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(fastrand::u64(0..=jitter_ms))
    }

    /// Backoff delay before retry number `attempt`: `unit * base^attempt`, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.backoff_unit.as_secs_f64() * self.backoff_base.powi(exponent);

        if !secs.is_finite() || secs >= self.backoff_cap.as_secs_f64() {
            self.backoff_cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Records a transient failure for a canonical URL
    pub fn record_failure(&self, canonical: &str) -> RetryDecision {
        let attempts = {
            let mut retries = self.retries.lock().unwrap();
            let count = retries.entry(canonical.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if attempts > self.max_retries {
            RetryDecision::Exhausted { attempts }
        } else {
            RetryDecision::Retry {
                attempt: attempts,
                delay: self.backoff_delay(attempts),
            }
        }
    }

    /// Clears the retry counter once a URL reached a terminal outcome
    pub fn record_success(&self, canonical: &str) {
        self.retries.lock().unwrap().remove(canonical);
    }

    /// Current failed-attempt count for a canonical URL
    pub fn attempts(&self, canonical: &str) -> u32 {
        self.retries
            .lock()
            .unwrap()
            .get(canonical)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests dispatched to a domain so far
    pub fn request_count(&self, domain: &str) -> u32 {
        self.domains
            .lock()
            .unwrap()
            .get(domain)
            .map(|state| state.request_count)
            .unwrap_or(0)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Closes the semaphore, releasing every pending `acquire` with `None`
    pub fn shutdown(&self) {
        self.semaphore.close();
    }
}
