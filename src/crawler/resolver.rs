//! Product resolution: static page plus discount follow-up
//!
//! A product's static detail page carries its name and list prices. When the
//! page shows a discount table, the actual discount tiers only arrive with a
//! second fetch of the follow-up endpoint. The resolver keeps the partially
//! extracted product under its [`CorrelationKey`] until that response comes
//! back, then merges both halves into one [`ResolvedProduct`].
//!
//! ```text
//! Discovered -> StaticExtracted -> Resolved                  (no discount marker)
//!                              \-> AwaitingFollowUp -> Resolved
//!                                                  \-> Failed (no stored partial)
//! ```
//!
//! A product whose follow-up fetch is skipped, or never answered by the end
//! of the crawl, is finished from its static fields and counted as a failed
//! follow-up. Nothing stays in the correlation store once a crawl completes.

use crate::crawler::parser::Document;
use crate::product::{parse_rands, CorrelationKey, DiscountTier, PartialProduct, ResolvedProduct};
use crate::state::ResolutionState;
use crate::url::follow_up_url;
use crate::DealzError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use url::Url;

const PRODUCT_FORM: &str = "form[name=productOptionsBean]";
const PRODUCT_NAME: &str = "h2.product-name";
const PRICE: &str = "#randPrice";
const SAVINGS: &str = ".was-price .randValue";
const DISCOUNT_MARKER: &str = "table#discount-table";

/// Result of processing a product detail page
#[derive(Debug, Clone, PartialEq)]
pub enum ProductStep {
    /// No discount marker; the product is finished
    Resolved(ResolvedProduct),
    /// Partial product stored; `follow_up` must be fetched to finish it
    AwaitingFollowUp { key: CorrelationKey, follow_up: Url },
    /// Page is not a usable product page
    Skipped(String),
}

/// Result of processing a follow-up response
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUpStep {
    /// Discount data merged (or none offered); the product is finished
    Resolved(ResolvedProduct),
    /// Payload could not be decoded; finished from static fields only
    Malformed {
        product: ResolvedProduct,
        reason: String,
    },
    /// No partial product was waiting for this key
    CorrelationMiss(CorrelationKey),
}

#[derive(Debug, Deserialize)]
struct FollowUpPayload {
    #[serde(rename = "productDetail", alias = "ProductDetail")]
    product_detail: ProductDetail,
}

#[derive(Debug, Deserialize)]
struct ProductDetail {
    #[serde(default, alias = "Discount")]
    discount: Option<Vec<DiscountTier>>,
}

/// Two-phase product state machine
///
/// `states` keeps one entry per product seen, so it grows with the catalog
/// the same way the frontier's visited set does.
#[derive(Debug, Default)]
pub struct ProductResolver {
    pending: Mutex<HashMap<CorrelationKey, PartialProduct>>,
    states: Mutex<HashMap<CorrelationKey, ResolutionState>>,
    correlation_misses: AtomicU64,
    malformed_follow_ups: AtomicU64,
    failed_follow_ups: AtomicU64,
}

impl ProductResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a product detail URL has been queued
    pub fn discover(&self, product_url: &Url) {
        if let Some(key) = CorrelationKey::from_url(product_url) {
            self.states
                .lock()
                .unwrap()
                .entry(key)
                .or_insert(ResolutionState::Discovered);
        }
    }

    /// Static phase: extracts a product from its detail page
    ///
    /// Fails with [`DealzError::IntegrityMismatch`] when the identifiers in
    /// the page's hidden form inputs disagree with the requested URL.
    pub fn on_product_page(&self, url: &Url, body: &str) -> Result<ProductStep, DealzError> {
        let Some(key) = CorrelationKey::from_url(url) else {
            return Ok(ProductStep::Skipped(
                "product URL lacks prodId/catId".to_string(),
            ));
        };

        let (partial, has_marker) = {
            let doc = Document::parse(body);
            if !doc.exists(PRODUCT_FORM) {
                return Ok(ProductStep::Skipped("page has no product form".to_string()));
            }

            check_integrity(url, &key, &doc)?;
            (extract_partial(url, key.clone(), &doc), doc.exists(DISCOUNT_MARKER))
        };

        self.transition(&key, ResolutionState::StaticExtracted);

        if !has_marker {
            self.transition(&key, ResolutionState::Resolved);
            return Ok(ProductStep::Resolved(partial.finalize()));
        }

        let Some(follow_up) = follow_up_url(url) else {
            self.transition(&key, ResolutionState::Resolved);
            return Ok(ProductStep::Resolved(partial.finalize()));
        };

        // Stored before the caller can queue the follow-up
        self.pending.lock().unwrap().insert(key.clone(), partial);
        self.transition(&key, ResolutionState::AwaitingFollowUp);

        Ok(ProductStep::AwaitingFollowUp { key, follow_up })
    }

    /// Follow-up phase: merges the discount payload into the stored product
    pub fn on_follow_up(&self, key: &CorrelationKey, body: &str) -> FollowUpStep {
        let Some(partial) = self.pending.lock().unwrap().remove(key) else {
            self.correlation_misses.fetch_add(1, Ordering::Relaxed);
            self.transition(key, ResolutionState::Failed);
            return FollowUpStep::CorrelationMiss(key.clone());
        };

        self.transition(key, ResolutionState::Resolved);

        let payload: FollowUpPayload = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                self.malformed_follow_ups.fetch_add(1, Ordering::Relaxed);
                return FollowUpStep::Malformed {
                    product: partial.finalize(),
                    reason: e.to_string(),
                };
            }
        };

        // The last tier is the deepest discount on offer
        let deepest = payload
            .product_detail
            .discount
            .as_deref()
            .and_then(|tiers| tiers.last());

        match deepest {
            Some(tier) => FollowUpStep::Resolved(partial.finalize_with_discount(tier)),
            None => {
                tracing::debug!("Discount marker for {} had no tiers", key);
                FollowUpStep::Resolved(partial.finalize())
            }
        }
    }

    /// Takes back a stored partial product whose follow-up was never queued
    ///
    /// The product is finished from its static fields.
    pub fn reclaim(&self, key: &CorrelationKey) -> Option<ResolvedProduct> {
        let partial = self.pending.lock().unwrap().remove(key)?;
        self.transition(key, ResolutionState::Resolved);
        Some(partial.finalize())
    }

    /// Finishes a stored product whose follow-up fetch was skipped
    ///
    /// Returns `None` when nothing was waiting for `key`.
    pub fn abandon_follow_up(&self, key: &CorrelationKey) -> Option<ResolvedProduct> {
        let product = self.reclaim(key)?;
        self.failed_follow_ups.fetch_add(1, Ordering::Relaxed);
        Some(product)
    }

    /// Finishes every product still waiting for a follow-up
    pub fn drain_pending(&self) -> Vec<ResolvedProduct> {
        let drained: Vec<(CorrelationKey, PartialProduct)> =
            self.pending.lock().unwrap().drain().collect();

        drained
            .into_iter()
            .map(|(key, partial)| {
                self.failed_follow_ups.fetch_add(1, Ordering::Relaxed);
                self.transition(&key, ResolutionState::Resolved);
                partial.finalize()
            })
            .collect()
    }

    /// Current state of a product, if it has been seen
    pub fn state(&self, key: &CorrelationKey) -> Option<ResolutionState> {
        self.states.lock().unwrap().get(key).copied()
    }

    /// Number of partial products waiting for a follow-up
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn correlation_misses(&self) -> u64 {
        self.correlation_misses.load(Ordering::Relaxed)
    }

    pub fn malformed_follow_ups(&self) -> u64 {
        self.malformed_follow_ups.load(Ordering::Relaxed)
    }

    /// Products finished without discount data because their follow-up failed
    pub fn failed_follow_ups(&self) -> u64 {
        self.failed_follow_ups.load(Ordering::Relaxed)
    }

    /// Moves a product to `next`; illegal moves are refused and leave the state as is
    fn transition(&self, key: &CorrelationKey, next: ResolutionState) -> bool {
        let mut states = self.states.lock().unwrap();
        let current = states.entry(key.clone()).or_insert(ResolutionState::Discovered);

        if !current.can_transition_to(next) {
            tracing::warn!("Refusing to move product {} from {} to {}", key, current, next);
            return false;
        }
        *current = next;
        true
    }
}

fn check_integrity(url: &Url, key: &CorrelationKey, doc: &Document) -> Result<(), DealzError> {
    let found_prod = doc
        .attr(&format!("{} input[name=prodId]", PRODUCT_FORM), "value")
        .unwrap_or_default();
    let found_cat = doc
        .attr(&format!("{} input[name=catId]", PRODUCT_FORM), "value")
        .unwrap_or_default();

    if found_prod != key.prod_id || found_cat != key.cat_id {
        return Err(DealzError::IntegrityMismatch {
            url: url.to_string(),
            requested_prod: key.prod_id.clone(),
            requested_cat: key.cat_id.clone(),
            found_prod,
            found_cat,
        });
    }
    Ok(())
}

fn extract_partial(url: &Url, key: CorrelationKey, doc: &Document) -> PartialProduct {
    let name = doc.text(PRODUCT_NAME).unwrap_or_default();

    let price = doc.text(PRICE).and_then(|text| match parse_rands(&text) {
        Ok(price) => Some(price),
        Err(e) => {
            tracing::warn!("Error parsing price {:?} on {}: {}", text, url, e);
            None
        }
    });

    let savings = doc
        .text(SAVINGS)
        .map(|text| match parse_rands(&text) {
            Ok(savings) => savings,
            Err(e) => {
                tracing::warn!("Error parsing savings {:?} on {}: {}", text, url, e);
                0.0
            }
        })
        .unwrap_or(0.0);

    PartialProduct {
        url: url.to_string(),
        key,
        name,
        price,
        savings,
    }
}
