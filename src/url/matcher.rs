/// Checks if a host matches an allow-list pattern
///
/// Two pattern forms are supported:
/// 1. Exact match: "www.ebucks.com" matches only "www.ebucks.com"
/// 2. Wildcard match: "*.ebucks.com" matches "ebucks.com" and any subdomain
///
/// # Examples
///
/// ```
/// use dealz_scraper::url::matches_wildcard;
///
/// assert!(matches_wildcard("www.ebucks.com", "www.ebucks.com"));
/// assert!(matches_wildcard("*.ebucks.com", "ebucks.com"));
/// assert!(matches_wildcard("*.ebucks.com", "www.ebucks.com"));
/// assert!(!matches_wildcard("*.ebucks.com", "notebucks.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
