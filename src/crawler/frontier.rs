//! Crawl frontier: pending URLs plus the visited set
//!
//! The frontier owns both the work queue and the set of canonical URLs that
//! have ever been queued. Checking the visited set and inserting into the
//! queue happen under one lock, so two workers discovering the same link can
//! never both queue it.
//!
//! Workers pull entries with [`Frontier::next_entry`], which suspends while
//! other workers may still discover work, and returns `None` once the queue
//! is empty and no entry is in flight.

use crate::config::FrontierOrdering;
use crate::url::{canonicalize_url, CrawlScope, PageKind};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use url::Url;

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// URL was new and is now pending
    Queued,
    /// Canonical form was already queued earlier in the crawl
    AlreadyVisited,
    /// URL is well formed but not part of the crawl, or the crawl is closed
    OutOfScope,
    /// URL is empty or cannot be parsed
    Malformed(String),
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Canonical URL, the identity of the entry
    pub url: Url,

    /// URL as it was discovered
    pub raw: String,

    /// Page shape the URL matched when it was queued
    pub kind: PageKind,

    /// Number of failed fetches so far
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

/// Thread-safe pending-URL store with dedup
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    scope: CrawlScope,
    ordering: FrontierOrdering,
}

impl Frontier {
    pub fn new(scope: CrawlScope, ordering: FrontierOrdering) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            notify: Notify::new(),
            scope,
            ordering,
        }
    }

    /// Offers a raw URL to the frontier
    ///
    /// The URL is canonicalized and classified first. Only in-scope URLs
    /// that were never queued before are added; everything else is reported
    /// through the outcome rather than as an error.
    pub fn enqueue(&self, raw: &str) -> EnqueueOutcome {
        let url = match canonicalize_url(raw) {
            Ok(url) => url,
            Err(e) => return EnqueueOutcome::Malformed(e.to_string()),
        };

        let kind = match self.scope.classify(&url) {
            Some(kind) => kind,
            None => return EnqueueOutcome::OutOfScope,
        };

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return EnqueueOutcome::OutOfScope;
            }
            if !inner.visited.insert(url.as_str().to_string()) {
                return EnqueueOutcome::AlreadyVisited;
            }

            inner.queue.push_back(FrontierEntry {
                url,
                raw: raw.to_string(),
                kind,
                attempts: 0,
            });
        }

        self.notify.notify_waiters();
        EnqueueOutcome::Queued
    }

    /// Re-inserts an entry whose fetch is being retried
    ///
    /// Skips the visited check, since the entry is already in the set.
    pub fn requeue(&self, entry: FrontierEntry) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return;
            }
            inner.queue.push_back(entry);
        }
        self.notify.notify_waiters();
    }

    /// Removes the next entry without waiting
    ///
    /// A dequeued entry counts as in flight until [`Frontier::task_done`] is
    /// called for it.
    pub fn dequeue(&self) -> Option<FrontierEntry> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return None;
        }
        self.pop(&mut inner)
    }

    fn pop(&self, inner: &mut FrontierInner) -> Option<FrontierEntry> {
        let entry = match self.ordering {
            FrontierOrdering::Fifo => inner.queue.pop_front(),
            FrontierOrdering::Lifo => inner.queue.pop_back(),
        }?;
        inner.in_flight += 1;
        Some(entry)
    }

    /// Waits for the next entry
    ///
    /// Returns `None` when the crawl is complete (queue empty, nothing in
    /// flight) or the frontier has been closed.
    pub async fn next_entry(&self) -> Option<FrontierEntry> {
        loop {
            // Registered before the state check so a wakeup between the
            // check and the await is not lost.
            let notified = self.notify.notified();

            {
                let mut inner = self.inner.lock().unwrap();
                if inner.closed {
                    return None;
                }
                if let Some(entry) = self.pop(&mut inner) {
                    return Some(entry);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks one in-flight entry as finished
    pub fn task_done(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Stops the crawl: pending entries are dropped and waiters released
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.closed = true;
            inner.queue.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries dequeued but not yet finished
    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap().in_flight
    }

    /// Number of distinct canonical URLs ever queued
    pub fn visited_count(&self) -> usize {
        self.inner.lock().unwrap().visited.len()
    }

    /// Returns true if the URL's canonical form has been queued
    pub fn is_visited(&self, raw: &str) -> bool {
        match canonicalize_url(raw) {
            Ok(url) => self.inner.lock().unwrap().visited.contains(url.as_str()),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const HOME: &str = "https://shop.test/web/shop/shopHome.do";

    fn frontier(ordering: FrontierOrdering) -> Frontier {
        Frontier::new(CrawlScope::any_host(), ordering)
    }

    fn category(cat: u32) -> String {
        format!("https://shop.test/web/shop/categorySelected.do?catId={}", cat)
    }

    #[test]
    fn test_enqueue_and_dequeue() {
        let frontier = frontier(FrontierOrdering::Fifo);
        assert!(frontier.enqueue(HOME).is_queued());
        assert_eq!(frontier.len(), 1);

        let entry = frontier.dequeue().unwrap();
        assert_eq!(entry.url.as_str(), HOME);
        assert_eq!(entry.kind, PageKind::CatalogHome);
        assert_eq!(entry.attempts, 0);
        assert!(frontier.is_empty());
        assert_eq!(frontier.in_flight(), 1);
    }

    #[test]
    fn test_reenqueue_is_noop() {
        let frontier = frontier(FrontierOrdering::Fifo);
        assert_eq!(frontier.enqueue(HOME), EnqueueOutcome::Queued);
        frontier.dequeue();

        let again = frontier.enqueue(HOME);
        assert_eq!(again, EnqueueOutcome::AlreadyVisited);
        assert!(!again.is_queued());
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_session_variants_collapse() {
        let frontier = frontier(FrontierOrdering::Fifo);
        let plain = "https://shop.test/web/shop/productSelected.do?prodId=1&catId=2";
        let session =
            "https://shop.test/web/shop/productSelected.do;jsessionid=ABC?catId=2&prodId=1#top";

        assert_eq!(frontier.enqueue(session), EnqueueOutcome::Queued);
        assert_eq!(frontier.enqueue(plain), EnqueueOutcome::AlreadyVisited);
        assert_eq!(frontier.len(), 1);

        let entry = frontier.dequeue().unwrap();
        assert_eq!(entry.url.as_str(), plain);
        assert_eq!(entry.raw, session);
        assert!(frontier.is_visited(session));
        assert!(frontier.is_visited(plain));
        assert!(!frontier.is_visited(
            "https://shop.test/web/shop/productSelected.do?prodId=2&catId=2"
        ));
        assert!(!frontier.is_visited(""));
    }

    #[test]
    fn test_out_of_scope_and_malformed() {
        let frontier = Frontier::new(
            CrawlScope::new(vec!["shop.test".to_string()]),
            FrontierOrdering::Fifo,
        );

        assert_eq!(
            frontier.enqueue("https://shop.test/about.html"),
            EnqueueOutcome::OutOfScope
        );
        assert_eq!(
            frontier.enqueue("https://elsewhere.test/web/shop/shopHome.do"),
            EnqueueOutcome::OutOfScope
        );
        assert!(matches!(frontier.enqueue(""), EnqueueOutcome::Malformed(_)));
        assert!(matches!(
            frontier.enqueue("not a url"),
            EnqueueOutcome::Malformed(_)
        ));
        assert_eq!(frontier.visited_count(), 0);
    }

    #[test]
    fn test_fifo_ordering() {
        let frontier = frontier(FrontierOrdering::Fifo);
        for cat in 1..=3 {
            frontier.enqueue(&category(cat));
        }

        let order: Vec<String> = std::iter::from_fn(|| frontier.dequeue())
            .map(|e| e.url.to_string())
            .collect();
        assert_eq!(order, vec![category(1), category(2), category(3)]);
    }

    #[test]
    fn test_lifo_ordering() {
        let frontier = frontier(FrontierOrdering::Lifo);
        for cat in 1..=3 {
            frontier.enqueue(&category(cat));
        }

        let order: Vec<String> = std::iter::from_fn(|| frontier.dequeue())
            .map(|e| e.url.to_string())
            .collect();
        assert_eq!(order, vec![category(3), category(2), category(1)]);
    }

    #[test]
    fn test_requeue_bypasses_visited_check() {
        let frontier = frontier(FrontierOrdering::Fifo);
        frontier.enqueue(HOME);
        let mut entry = frontier.dequeue().unwrap();
        entry.attempts += 1;

        frontier.requeue(entry);
        frontier.task_done();

        let retried = frontier.dequeue().unwrap();
        assert_eq!(retried.attempts, 1);
        assert_eq!(frontier.visited_count(), 1);
    }

    #[tokio::test]
    async fn test_next_entry_returns_none_when_complete() {
        let frontier = frontier(FrontierOrdering::Fifo);
        assert!(frontier.next_entry().await.is_none());

        frontier.enqueue(HOME);
        assert!(frontier.next_entry().await.is_some());
        frontier.task_done();
        assert!(frontier.next_entry().await.is_none());
    }

    #[tokio::test]
    async fn test_next_entry_waits_for_in_flight_work() {
        let frontier = Arc::new(frontier(FrontierOrdering::Fifo));
        frontier.enqueue(HOME);
        let _home = frontier.next_entry().await.unwrap();

        let waiter = {
            let frontier = Arc::clone(&frontier);
            tokio::spawn(async move { frontier.next_entry().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        frontier.enqueue(&category(7));
        frontier.task_done();

        let entry = waiter.await.unwrap().unwrap();
        assert_eq!(entry.url.as_str(), category(7));
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let frontier = Arc::new(frontier(FrontierOrdering::Fifo));
        frontier.enqueue(HOME);
        frontier.enqueue(&category(1));
        let _home = frontier.next_entry().await.unwrap();

        frontier.close();
        assert!(frontier.next_entry().await.is_none());
        assert!(frontier.is_empty());
        assert_eq!(frontier.enqueue(&category(2)), EnqueueOutcome::OutOfScope);
    }
}
