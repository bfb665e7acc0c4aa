//! Routes fetched pages to their typed handlers
//!
//! Each fetched URL is matched against the catalog's page shapes. Listing
//! pages yield links for the frontier; product pages and follow-up responses
//! go to the [`ProductResolver`]. The outcome tells the coordinator what to do
//! next; nothing is registered as a callback.

use crate::crawler::parser::Document;
use crate::crawler::resolver::{FollowUpStep, ProductResolver, ProductStep};
use crate::product::CorrelationKey;
use crate::url::{CrawlScope, PageKind};
use crate::DealzError;
use std::sync::Arc;
use url::Url;

/// What a fetched page turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Home or category page with its anchors, already made absolute
    Links { kind: PageKind, links: Vec<String> },
    /// Product detail page, after the resolver's static phase
    Product(ProductStep),
    /// Follow-up response, after the resolver's follow-up phase
    FollowUp(FollowUpStep),
    /// Matched a page shape but could not be used
    Skipped { kind: PageKind, reason: String },
    /// Matches no page shape
    Ignored,
}

pub struct PageClassifier {
    scope: CrawlScope,
    resolver: Arc<ProductResolver>,
}

impl PageClassifier {
    pub fn new(scope: CrawlScope, resolver: Arc<ProductResolver>) -> Self {
        Self { scope, resolver }
    }

    /// Page shape of a URL, if it is in scope
    pub fn kind_of(&self, url: &Url) -> Option<PageKind> {
        self.scope.classify(url)
    }

    /// Classifies a fetched page and runs its handler
    ///
    /// Only a product page whose identifiers disagree with its URL produces
    /// an error.
    pub fn classify(&self, url: &Url, body: &str) -> Result<PageOutcome, DealzError> {
        let Some(kind) = self.scope.classify(url) else {
            return Ok(PageOutcome::Ignored);
        };

        let outcome = match kind {
            PageKind::CatalogHome | PageKind::CategoryListing => PageOutcome::Links {
                kind,
                links: Document::parse(body).links(url),
            },
            PageKind::ProductDetail => match self.resolver.on_product_page(url, body)? {
                ProductStep::Skipped(reason) => PageOutcome::Skipped { kind, reason },
                step => PageOutcome::Product(step),
            },
            PageKind::ProductFollowUp => match CorrelationKey::from_url(url) {
                Some(key) => PageOutcome::FollowUp(self.resolver.on_follow_up(&key, body)),
                None => PageOutcome::Skipped {
                    kind,
                    reason: "follow-up URL lacks prodId/catId".to_string(),
                },
            },
        };

        Ok(outcome)
    }
}
