//! Product data model
//!
//! A product starts life as a [`PartialProduct`] scraped from its static
//! detail page and ends as an immutable [`ResolvedProduct`] once any discount
//! data from the follow-up fetch has been merged in.

use once_regex::{rands_regex, whitespace_regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Number of internal points that make up one unit of display currency
pub const POINTS_PER_CURRENCY_UNIT: f64 = 10.0;

/// The (category id, product id) pair linking a product page to its follow-up
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey {
    pub cat_id: String,
    pub prod_id: String,
}

impl CorrelationKey {
    pub fn new(cat_id: impl Into<String>, prod_id: impl Into<String>) -> Self {
        Self {
            cat_id: cat_id.into(),
            prod_id: prod_id.into(),
        }
    }

    /// Reads `prodId` and `catId` from a URL's query string
    ///
    /// Returns `None` if either parameter is missing or empty.
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut prod_id = None;
        let mut cat_id = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                "prodId" if prod_id.is_none() => prod_id = Some(value.into_owned()),
                "catId" if cat_id.is_none() => cat_id = Some(value.into_owned()),
                _ => {}
            }
        }

        match (cat_id, prod_id) {
            (Some(cat), Some(prod)) if !cat.is_empty() && !prod.is_empty() => {
                Some(Self::new(cat, prod))
            }
            _ => None,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prodId={}&catId={}", self.prod_id, self.cat_id)
    }
}

/// Fields extracted from a product's static detail page
#[derive(Debug, Clone, PartialEq)]
pub struct PartialProduct {
    pub url: String,
    pub key: CorrelationKey,
    pub name: String,
    pub price: Option<f64>,
    pub savings: f64,
}

impl PartialProduct {
    /// Finalizes the product without any discount applied
    pub fn finalize(self) -> ResolvedProduct {
        ResolvedProduct {
            url: self.url,
            name: self.name,
            cat_id: self.key.cat_id,
            prod_id: self.key.prod_id,
            price: self.price,
            savings: self.savings,
            percentage: 0.0,
        }
    }

    /// Finalizes the product with a discount tier merged in
    pub fn finalize_with_discount(self, tier: &DiscountTier) -> ResolvedProduct {
        let mut product = self.finalize();
        product.percentage = tier.percent;
        product.price = Some(points_to_currency(tier.points_price));
        product.savings = points_to_currency(tier.points_savings);
        product
    }
}

/// One row of a product's multi-level discount schedule, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountTier {
    #[serde(alias = "Percent")]
    pub percent: f64,

    #[serde(rename = "eBucksPrice", alias = "EBucksPrice", default)]
    pub points_price: f64,

    #[serde(rename = "eBucksSavings", alias = "EBucksSavings", default)]
    pub points_savings: f64,
}

/// A finished product record, delivered exactly once per crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProduct {
    pub url: String,
    pub name: String,
    pub cat_id: String,
    pub prod_id: String,
    pub price: Option<f64>,
    pub savings: f64,
    pub percentage: f64,
}

impl ResolvedProduct {
    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::new(self.cat_id.clone(), self.prod_id.clone())
    }

    pub fn is_discounted(&self) -> bool {
        self.percentage > 0.0
    }
}

/// Converts an amount in internal points to display currency
///
/// ```
/// use dealz_scraper::product::points_to_currency;
///
/// assert_eq!(points_to_currency(100.0), 10.0);
/// ```
pub fn points_to_currency(points: f64) -> f64 {
    points / POINTS_PER_CURRENCY_UNIT
}

/// Parses a display-currency string such as `R1 234.50`
///
/// Thousands separators may be spaces (including non-breaking spaces).
pub fn parse_rands(text: &str) -> Result<f64, String> {
    let captures = rands_regex()
        .captures(text)
        .ok_or_else(|| format!("{:?} does not look like a rand amount", text))?;
    let digits = whitespace_regex().replace_all(&captures[1], "");
    digits
        .parse::<f64>()
        .map_err(|e| format!("invalid rand amount {:?}: {}", digits, e))
}

mod once_regex {
    use regex::Regex;
    use std::sync::OnceLock;

    pub fn rands_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"R([\d\s]+(\.\d+)?)").expect("valid regex"))
    }

    pub fn whitespace_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\s").expect("valid regex"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial() -> PartialProduct {
        PartialProduct {
            url: "https://shop.test/web/shop/productSelected.do?prodId=7&catId=3".to_string(),
            key: CorrelationKey::new("3", "7"),
            name: "Kettle".to_string(),
            price: Some(499.0),
            savings: 50.0,
        }
    }

    #[test]
    fn test_parse_rands_simple() {
        assert_eq!(parse_rands("R499.00").unwrap(), 499.0);
    }

    #[test]
    fn test_parse_rands_with_thousands_separator() {
        assert_eq!(parse_rands("R1 234.50").unwrap(), 1234.5);
        assert_eq!(parse_rands("R12\u{a0}000").unwrap(), 12000.0);
    }

    #[test]
    fn test_parse_rands_rejects_garbage() {
        assert!(parse_rands("eB4990").is_err());
        assert!(parse_rands("").is_err());
    }

    #[test]
    fn test_correlation_key_from_url() {
        let url =
            Url::parse("https://shop.test/web/shop/productSelected.do?prodId=7&catId=3").unwrap();
        assert_eq!(
            CorrelationKey::from_url(&url),
            Some(CorrelationKey::new("3", "7"))
        );
    }

    #[test]
    fn test_correlation_key_requires_both_ids() {
        let url = Url::parse("https://shop.test/web/shop/productSelected.do?prodId=7").unwrap();
        assert_eq!(CorrelationKey::from_url(&url), None);

        let url =
            Url::parse("https://shop.test/web/shop/productSelected.do?prodId=&catId=3").unwrap();
        assert_eq!(CorrelationKey::from_url(&url), None);
    }

    #[test]
    fn test_finalize_without_discount() {
        let product = partial().finalize();
        assert_eq!(product.percentage, 0.0);
        assert_eq!(product.price, Some(499.0));
        assert_eq!(product.savings, 50.0);
        assert!(!product.is_discounted());
    }

    #[test]
    fn test_finalize_with_discount_converts_points() {
        let tier = DiscountTier {
            percent: 40.0,
            points_price: 2994.0,
            points_savings: 1996.0,
        };
        let product = partial().finalize_with_discount(&tier);
        assert_eq!(product.percentage, 40.0);
        assert_eq!(product.price, Some(299.4));
        assert_eq!(product.savings, 199.6);
        assert!(product.is_discounted());
    }

    #[test]
    fn test_points_conversion_scale() {
        assert_eq!(points_to_currency(100.0), 10.0);
        assert_eq!(points_to_currency(0.0), 0.0);
    }
}
