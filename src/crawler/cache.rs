//! On-disk response cache
//!
//! Wraps any [`Transport`] and stores successful responses as JSON files
//! named after the SHA-256 of the request. Cache read and write failures are
//! logged and never fail the fetch.

use crate::crawler::fetcher::{FetchRequest, FetchResponse, Transport, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    status: u16,
    final_url: String,
    body: String,
}

/// Transport decorator that serves repeated requests from disk
pub struct CachingTransport<T> {
    inner: T,
    dir: PathBuf,
}

impl<T: Transport> CachingTransport<T> {
    pub fn new(inner: T, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    /// Cache key for a request: hex SHA-256 over the URL and headers
    pub fn cache_key(request: &FetchRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.url.as_str().as_bytes());
        for (name, value) in &request.headers {
            hasher.update(b"\n");
            hasher.update(name.to_ascii_lowercase().as_bytes());
            hasher.update(b": ");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn entry_path(&self, request: &FetchRequest) -> PathBuf {
        self.dir.join(format!("{}.json", Self::cache_key(request)))
    }

    async fn load(&self, path: &Path) -> Option<FetchResponse> {
        let raw = tokio::fs::read(path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };
        let final_url = Url::parse(&entry.final_url).ok()?;

        Some(FetchResponse {
            status: entry.status,
            body: entry.body,
            final_url,
        })
    }

    async fn store(&self, path: &Path, request: &FetchRequest, response: &FetchResponse) {
        let entry = CacheEntry {
            url: request.url.to_string(),
            status: response.status,
            final_url: response.final_url.to_string(),
            body: response.body.clone(),
        };

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let json = serde_json::to_vec(&entry)?;
            tokio::fs::write(path, json).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to cache response for {}: {}", request.url, e);
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let path = self.entry_path(request);

        if let Some(response) = self.load(&path).await {
            tracing::trace!("Cache hit for {}", request.url);
            return Ok(response);
        }

        let response = self.inner.fetch(request).await?;
        if response.is_success() {
            self.store(&path, request, &response).await;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingTransport {
        status: u16,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResponse {
                status: self.status,
                body: format!("body {}", n),
                final_url: request.url.clone(),
            })
        }
    }

    fn counting(status: u16) -> CountingTransport {
        CountingTransport {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::new(Url::parse("https://shop.test/web/shop/shopHome.do").unwrap())
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_disk() {
        let dir = TempDir::new().unwrap();
        let transport = CachingTransport::new(counting(200), dir.path());

        let first = transport.fetch(&request()).await.unwrap();
        let second = transport.fetch(&request()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let transport = CachingTransport::new(counting(503), dir.path());

        transport.fetch(&request()).await.unwrap();
        transport.fetch(&request()).await.unwrap();

        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key_depends_on_headers() {
        let plain = request();
        let mut with_cookie = request();
        with_cookie
            .headers
            .insert("Cookie".to_string(), "js=1".to_string());

        let a = CachingTransport::<CountingTransport>::cache_key(&plain);
        let b = CachingTransport::<CountingTransport>::cache_key(&with_cookie);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, CachingTransport::<CountingTransport>::cache_key(&plain));
    }
}
