//! HTTP transport for the crawler
//!
//! This module handles:
//! - The [`Transport`] seam the crawl engine fetches through
//! - Building the reqwest client with the site's user agent and timeouts
//! - Manual redirect handling, consulting a [`RedirectPolicy`] on every hop
//! - Mapping client failures to [`TransportError`]
//!
//! Status codes are not interpreted here: any response that is not a
//! redirect is returned as-is, and the coordinator decides what a 404 or a
//! 503 means for the crawl.

use crate::config::SiteConfig;
use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A request for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    /// Extra headers, sorted by name
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(url: Url, headers: BTreeMap<String, String>) -> Self {
        Self { url, headers }
    }
}

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// URL the body was served from, after redirects
    pub final_url: Url,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch failures raised by a transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{from} redirected to the error page {to}")]
    ErrorPageRedirect { from: String, to: String },

    #[error("More than {limit} redirects starting at {url}")]
    TooManyRedirects { url: String, limit: u32 },

    #[error("Unusable redirect from {url}: {reason}")]
    InvalidRedirect { url: String, reason: String },
}

impl TransportError {
    /// Returns true for failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Fetches pages for the crawl engine
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// What to do with a redirect target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectAction {
    /// Follow the redirect transparently
    Follow,
    /// The target is the site's generic failure page; stop and skip
    ErrorPage,
}

/// Classifies redirect targets
pub trait RedirectPolicy: Send + Sync {
    fn classify(&self, target: &Url) -> RedirectAction;
}

/// Treats any target whose path contains one of the markers as the error page
#[derive(Debug, Clone)]
pub struct ErrorPageRedirectPolicy {
    markers: Vec<String>,
}

impl ErrorPageRedirectPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl RedirectPolicy for ErrorPageRedirectPolicy {
    fn classify(&self, target: &Url) -> RedirectAction {
        let path = target.path();
        if self.markers.iter().any(|marker| path.contains(marker.as_str())) {
            RedirectAction::ErrorPage
        } else {
            RedirectAction::Follow
        }
    }
}

/// Builds an HTTP client with the site's user agent and timeouts
///
/// Redirects are disabled at the client level and handled by
/// [`HttpTransport`]; no cookie store is kept.
pub fn build_http_client(config: &SiteConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed transport with manual redirect handling
pub struct HttpTransport {
    client: Client,
    policy: Box<dyn RedirectPolicy>,
    max_redirects: u32,
}

impl HttpTransport {
    pub fn new(client: Client, policy: Box<dyn RedirectPolicy>, max_redirects: u32) -> Self {
        Self {
            client,
            policy,
            max_redirects,
        }
    }

    /// Builds a transport from the site configuration
    pub fn from_config(config: &SiteConfig, max_redirects: u32) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        let policy = ErrorPageRedirectPolicy::new(config.error_page_markers.clone());
        Ok(Self::new(client, Box::new(policy), max_redirects))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Fetches a URL, following redirects up to the configured limit
    ///
    /// # Redirect Handling
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Target matches an error-page marker | `ErrorPageRedirect` |
    /// | More than `max_redirects` hops | `TooManyRedirects` |
    /// | Missing or unparseable `Location` | `InvalidRedirect` |
    /// | Otherwise | Next hop is requested |
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut current = request.url.clone();
        let mut hops = 0;

        loop {
            let mut builder = self.client.get(current.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await?;
            let status = response.status();

            if !status.is_redirection() {
                let body = response.text().await?;
                return Ok(FetchResponse {
                    status: status.as_u16(),
                    body,
                    final_url: current,
                });
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| TransportError::InvalidRedirect {
                    url: current.to_string(),
                    reason: format!("HTTP {} without a Location header", status.as_u16()),
                })?;

            let target = current
                .join(location)
                .map_err(|e| TransportError::InvalidRedirect {
                    url: current.to_string(),
                    reason: format!("bad Location {:?}: {}", location, e),
                })?;

            if self.policy.classify(&target) == RedirectAction::ErrorPage {
                return Err(TransportError::ErrorPageRedirect {
                    from: request.url.to_string(),
                    to: target.to_string(),
                });
            }

            hops += 1;
            if hops > self.max_redirects {
                return Err(TransportError::TooManyRedirects {
                    url: request.url.to_string(),
                    limit: self.max_redirects,
                });
            }

            tracing::debug!("Following redirect {} -> {}", current, target);
            current = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&SiteConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_error_page_policy() {
        let policy = ErrorPageRedirectPolicy::new(vec!["globalExceptionPage.jsp".to_string()]);

        let error_page =
            Url::parse("https://shop.test/web/eBucks/errors/globalExceptionPage.jsp").unwrap();
        let product =
            Url::parse("https://shop.test/web/shop/productSelected.do?prodId=1&catId=2").unwrap();

        assert_eq!(policy.classify(&error_page), RedirectAction::ErrorPage);
        assert_eq!(policy.classify(&product), RedirectAction::Follow);
    }

    #[test]
    fn test_error_page_policy_ignores_query() {
        let policy = ErrorPageRedirectPolicy::new(vec!["globalExceptionPage.jsp".to_string()]);
        let home = Url::parse(
            "https://shop.test/web/shop/shopHome.do?returnTo=/web/eBucks/errors/globalExceptionPage.jsp",
        )
        .unwrap();

        assert_eq!(policy.classify(&home), RedirectAction::Follow);
    }

    #[test]
    fn test_empty_policy_follows_everything() {
        let policy = ErrorPageRedirectPolicy::new(Vec::new());
        let url = Url::parse("https://shop.test/globalExceptionPage.jsp").unwrap();
        assert_eq!(policy.classify(&url), RedirectAction::Follow);
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(TransportError::Timeout("slow".into()).is_transient());
        assert!(!TransportError::ErrorPageRedirect {
            from: "a".into(),
            to: "b".into()
        }
        .is_transient());
        assert!(!TransportError::TooManyRedirects {
            url: "a".into(),
            limit: 10
        }
        .is_transient());
    }

    #[test]
    fn test_response_success_range() {
        let url = Url::parse("https://shop.test/").unwrap();
        let response = |status| FetchResponse {
            status,
            body: String::new(),
            final_url: url.clone(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(404).is_success());
        assert!(!response(503).is_success());
    }

    // Redirect following is exercised against a wiremock server in
    // tests/crawl_tests.rs
}
