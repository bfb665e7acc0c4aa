use crate::UrlError;
use url::Url;

/// Query parameters that identify a catalog page, in canonical order
const IDENTITY_PARAMS: &[&str] = &["prodId", "catId"];

/// Catalog endpoints whose query string is reduced to [`IDENTITY_PARAMS`]
const CATALOG_ENDPOINTS: &[&str] = &[
    "shopHome.do",
    "categorySelected.do",
    "productSelected.do",
    "productSelectedJson.do",
];

/// Session-tracking query parameters that never change the page content
const SESSION_PARAMS: &[&str] = &["jsessionid", "phpsessid", "sessionid", "sid"];

/// Canonicalizes a URL so that equivalent catalog pages share one identity
///
/// # Canonicalization Steps
///
/// 1. Reject empty input, unparseable URLs and non-HTTP(S) schemes
/// 2. Drop the fragment
/// 3. Drop `;name=value` path parameters (e.g. `;jsessionid=...`)
/// 4. For catalog endpoints, keep only `prodId` then `catId` (first occurrence
///    of each, in that order)
/// 5. For any other URL, drop session parameters and sort what remains
/// 6. Remove an empty query string
///
/// The result is stable: canonicalizing a canonical URL returns it unchanged.
///
/// # Examples
///
/// ```
/// use dealz_scraper::url::canonicalize_url;
///
/// let url = canonicalize_url(
///     "https://shop.test/web/shop/categorySelected.do;jsessionid=E1FE?catId=300&extraInfo=x",
/// )
/// .unwrap();
/// assert_eq!(url.as_str(), "https://shop.test/web/shop/categorySelected.do?catId=300");
/// ```
pub fn canonicalize_url(raw: &str) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    let path = strip_path_params(url.path());
    url.set_path(&path);

    let params = if is_catalog_endpoint(&path) {
        identity_params(&url)
    } else {
        sorted_params(&url)
    };

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    Ok(url)
}

/// Removes `;param` suffixes from every path segment
fn strip_path_params(path: &str) -> String {
    path.split('/')
        .map(|segment| segment.split(';').next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_catalog_endpoint(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    CATALOG_ENDPOINTS.contains(&last_segment)
}

/// Keeps the identifying parameters of a catalog page in canonical order
fn identity_params(url: &Url) -> Vec<(String, String)> {
    IDENTITY_PARAMS
        .iter()
        .filter_map(|name| {
            url.query_pairs()
                .find(|(key, _)| &**key == *name)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
        })
        .collect()
}

/// Drops session parameters and sorts the rest by key then value
fn sorted_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_session_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_session_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SESSION_PARAMS.contains(&key.as_str())
}
