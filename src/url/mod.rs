//! URL handling module
//!
//! This module provides URL canonicalization, domain extraction, allow-list
//! matching, and classification of catalog URLs into known page shapes.

mod domain;
mod matcher;
mod normalize;

use crate::product::CorrelationKey;
use regex::Regex;
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::canonicalize_url;

/// Path of the product follow-up (discount) endpoint
const FOLLOW_UP_ENDPOINT: &str = "productSelectedJson.do";

/// Known page shapes of the catalog site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// The shop landing page, linking to every category
    CatalogHome,
    /// A category listing, linking to products and sub-categories
    CategoryListing,
    /// A product's static detail page
    ProductDetail,
    /// The discount fragment endpoint fetched after a product detail page
    ProductFollowUp,
}

impl PageKind {
    /// Returns true for pages whose anchors feed the frontier
    pub fn harvests_links(&self) -> bool {
        matches!(self, Self::CatalogHome | Self::CategoryListing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogHome => "catalog_home",
            Self::CategoryListing => "category_listing",
            Self::ProductDetail => "product_detail",
            Self::ProductFollowUp => "product_follow_up",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Defines which URLs belong to the crawl
///
/// A URL is in scope when its host passes the domain allow-list (an empty
/// list allows any host) and its path matches one of the page shapes. Shapes
/// are tried in order; the follow-up endpoint is listed before the detail
/// page because both share the `productSelected` prefix.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    allowed_domains: Vec<String>,
    shapes: Vec<(PageKind, Regex)>,
}

impl CrawlScope {
    /// Creates a scope restricted to the given host patterns
    pub fn new(allowed_domains: Vec<String>) -> Self {
        let shapes = [
            (PageKind::CatalogHome, r"/web/shop/shopHome\.do$"),
            (PageKind::CategoryListing, r"/web/shop/categorySelected\.do$"),
            (PageKind::ProductFollowUp, r"/web/shop/productSelectedJson\.do$"),
            (PageKind::ProductDetail, r"/web/shop/productSelected\.do$"),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid page-shape pattern")))
        .collect();

        Self {
            allowed_domains,
            shapes,
        }
    }

    /// Creates a scope that accepts catalog pages on any host
    pub fn any_host() -> Self {
        Self::new(Vec::new())
    }

    /// Returns true if the host passes the allow-list
    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|pattern| matches_wildcard(pattern, domain))
    }

    /// Classifies a URL into a page shape, or `None` if it is out of scope
    pub fn classify(&self, url: &Url) -> Option<PageKind> {
        let domain = extract_domain(url)?;
        if !self.is_domain_allowed(&domain) {
            return None;
        }

        self.shapes
            .iter()
            .find(|(_, pattern)| pattern.is_match(url.path()))
            .map(|(kind, _)| *kind)
    }
}

impl Default for CrawlScope {
    fn default() -> Self {
        Self::any_host()
    }
}

/// Derives the discount follow-up URL for a product detail URL
///
/// The follow-up lives next to the detail page and takes the same `prodId`
/// and `catId`. Returns `None` if the URL does not carry both identifiers.
///
/// ```
/// use url::Url;
/// use dealz_scraper::url::follow_up_url;
///
/// let detail = Url::parse("https://shop.test/web/shop/productSelected.do?prodId=9&catId=4").unwrap();
/// assert_eq!(
///     follow_up_url(&detail).unwrap().as_str(),
///     "https://shop.test/web/shop/productSelectedJson.do?prodId=9&catId=4"
/// );
/// ```
pub fn follow_up_url(product_url: &Url) -> Option<Url> {
    let key = CorrelationKey::from_url(product_url)?;

    let mut url = product_url.clone();
    let parent = url
        .path()
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .unwrap_or_default();
    url.set_path(&format!("{}/{}", parent, FOLLOW_UP_ENDPOINT));
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("prodId", &key.prod_id)
        .append_pair("catId", &key.cat_id);

    Some(url)
}
