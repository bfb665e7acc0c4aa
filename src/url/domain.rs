use url::Url;

/// Extracts the lowercase host of a URL
///
/// Used as the politeness key: all pacing is per host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use dealz_scraper::url::extract_domain;
///
/// let url = Url::parse("https://WWW.EBUCKS.COM/web/shop/shopHome.do").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.ebucks.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://www.ebucks.com/web/shop/shopHome.do").unwrap();
        assert_eq!(extract_domain(&url), Some("www.ebucks.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/web/shop/shopHome.do").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Shop.Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("shop.example.com".to_string()));
    }
}
