use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the defaults below, which crawl the live catalog politely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
}

/// Order in which the frontier hands out pending URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierOrdering {
    /// Breadth-first: oldest discovered URL first
    #[default]
    Fifo,
    /// Depth-first: newest discovered URL first
    Lifo,
}

/// Crawl engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of workers, which is also the bound on in-flight fetches
    pub threads: u32,

    /// Frontier ordering policy
    pub ordering: FrontierOrdering,

    /// Fixed delay between requests to the same domain (milliseconds)
    pub delay_ms: u64,

    /// Upper bound of the random jitter added to the delay (milliseconds)
    pub random_delay_ms: u64,

    /// Failed attempts tolerated per URL before the crawl aborts
    pub max_retries: u32,

    /// Base of the exponential backoff
    pub backoff_base: f64,

    /// Unit the backoff power is multiplied by (milliseconds)
    pub backoff_unit_ms: u64,

    /// Upper bound for a single backoff sleep (milliseconds)
    pub backoff_cap_ms: u64,

    /// Redirect hops followed before a URL is skipped
    pub max_redirects: u32,
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn random_delay(&self) -> Duration {
        Duration::from_millis(self.random_delay_ms)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            ordering: FrontierOrdering::Fifo,
            delay_ms: 2_000,
            random_delay_ms: 5_000,
            max_retries: 5,
            backoff_base: 2.0,
            backoff_unit_ms: 1_000,
            backoff_cap_ms: 300_000,
            max_redirects: 10,
        }
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Catalog home page the crawl starts from
    pub start_url: String,

    /// Host patterns allowed in the crawl (e.g. "www.ebucks.com" or
    /// "*.ebucks.com"); empty allows any host
    pub allowed_domains: Vec<String>,

    /// User agent sent with every request
    pub user_agent: String,

    /// Fixed headers sent with every request
    pub headers: HashMap<String, String>,

    /// Substrings of a redirect target that identify the site's error page
    pub error_page_markers: Vec<String>,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.ebucks.com/web/shop/shopHome.do".to_string(),
            allowed_domains: vec!["www.ebucks.com".to_string()],
            user_agent: "Mozilla/5.0 (Windows NT x.y; Win64; x64; rv:10.0) Gecko/20100101 Firefox/10.0"
                .to_string(),
            headers: HashMap::from([("Cookie".to_string(), "js=1637881630272".to_string())]),
            error_page_markers: vec!["globalExceptionPage.jsp".to_string()],
            request_timeout_secs: 300,
            connect_timeout_secs: 300,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory product records are written to
    pub data_dir: PathBuf,

    /// Wipe and reuse `data_dir` instead of creating a timestamped subdirectory
    pub overwrite: bool,

    /// On-disk response cache; `None` disables caching
    pub cache_dir: Option<PathBuf>,

    /// Directory for the append-only diagnostic logs; `None` disables them
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            overwrite: false,
            cache_dir: None,
            diagnostics_dir: None,
        }
    }
}

impl OutputConfig {
    /// Response cache directory, if caching is enabled
    ///
    /// An empty path in the file counts as disabled.
    pub fn cache_dir(&self) -> Option<&Path> {
        non_empty(self.cache_dir.as_deref())
    }

    /// Diagnostics directory, if diagnostic logs are enabled
    pub fn diagnostics_dir(&self) -> Option<&Path> {
        non_empty(self.diagnostics_dir.as_deref())
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}
