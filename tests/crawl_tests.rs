//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small catalog and run the full crawl
//! cycle end-to-end over HTTP.

use dealz_scraper::config::{Config, CrawlerConfig};
use dealz_scraper::crawler::Crawler;
use dealz_scraper::output::{load_products_from_dir, DiagnosticLog, DirectoryWriter};
use dealz_scraper::state::PageState;
use dealz_scraper::{DealzError, ResolvedProduct};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME_PATH: &str = "/web/shop/shopHome.do";
const CATEGORY_PATH: &str = "/web/shop/categorySelected.do";
const PRODUCT_PATH: &str = "/web/shop/productSelected.do";
const FOLLOW_UP_PATH: &str = "/web/shop/productSelectedJson.do";
const ERROR_PAGE_PATH: &str = "/web/eBucks/errors/globalExceptionPage.jsp";

/// Creates a fast test configuration pointed at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.crawler = CrawlerConfig {
        threads: 2,
        delay_ms: 0,
        random_delay_ms: 0,
        max_retries: 2,
        backoff_unit_ms: 1,
        backoff_cap_ms: 10,
        ..Default::default()
    };
    config.site.start_url = format!("{}{}", base_url, HOME_PATH);
    // Mock server runs on 127.0.0.1
    config.site.allowed_domains = vec![];
    config
}

fn product_page(prod: u32, price: &str, discounted: bool) -> String {
    format!(
        r#"<html><body>
        <form name="productOptionsBean" method="post">
            <h2 class="product-name">Gadget {prod}</h2>
            <p class="was-price">Save: <strong><span class="randValue">R10.00</span></strong></p>
            <p>Pay in Rands: <strong><span id="randPrice" class="randValue">{price}</span></strong></p>
            {table}
            <input type="hidden" name="prodId" value="{prod}">
            <input type="hidden" name="catId" value="7">
        </form>
        </body></html>"#,
        prod = prod,
        price = price,
        table = if discounted {
            r#"<table id="discount-table"><tr><td>tiers</td></tr></table>"#
        } else {
            ""
        },
    )
}

/// Mounts home -> category 7 -> products 1..=3; product 2 carries a discount
async fn mount_catalog(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .and(header("Cookie", "js=1637881630272"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <a href="categorySelected.do;jsessionid=AB12?catId=7">Gadgets</a>
            <a href="/web/help/faq.html">FAQ</a>
            </body></html>"#,
        ))
        .expect(expected_fetches)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .and(query_param("catId", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <a href="productSelected.do?prodId=1&amp;catId=7">Gadget 1</a>
            <a href="productSelected.do?catId=7&amp;prodId=2">Gadget 2</a>
            <a href="productSelected.do?prodId=3&amp;catId=7#reviews">Gadget 3</a>
            <a href="productSelected.do?prodId=1&amp;catId=7">Gadget 1 again</a>
            </body></html>"#,
        ))
        .expect(expected_fetches)
        .mount(server)
        .await;

    for (prod, price, discounted) in [(1, "R1 299.00", false), (2, "R500.00", true), (3, "R42.50", false)] {
        Mock::given(method("GET"))
            .and(path(PRODUCT_PATH))
            .and(query_param("prodId", prod.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(product_page(prod, price, discounted)),
            )
            .expect(expected_fetches)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(FOLLOW_UP_PATH))
        .and(query_param("prodId", "2"))
        .and(query_param("catId", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"productDetail":{"discount":[
                {"percent":15,"eBucksPrice":4250,"eBucksSavings":750},
                {"percent":30,"eBucksPrice":3500,"eBucksSavings":1500}
            ]}}"#,
        ))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

fn sorted_products(dir: &Path) -> Vec<ResolvedProduct> {
    let mut products = load_products_from_dir(dir).expect("Failed to load products");
    products.sort_by(|a, b| a.prod_id.cmp(&b.prod_id));
    products
}

#[tokio::test]
async fn test_full_crawl_writes_every_product() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;

    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let diag_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&server.uri());

    let writer = DirectoryWriter::new(data_dir.path());
    let diagnostics = DiagnosticLog::open(diag_dir.path()).expect("Failed to open logs");
    let crawler = Crawler::from_config(&config, Box::new(writer))
        .expect("Failed to build crawler")
        .with_diagnostics(diagnostics);

    let report = crawler
        .run(&config.site.start_url)
        .await
        .expect("Crawl failed");

    assert_eq!(report.products_emitted, 3);
    assert_eq!(report.discounted_products, 1);
    assert_eq!(report.pages_skipped(), 0);

    let products = sorted_products(data_dir.path());
    assert_eq!(products.len(), 3);

    assert_eq!(products[0].name, "Gadget 1");
    assert_eq!(products[0].price, Some(1299.0));
    assert_eq!(products[0].savings, 10.0);
    assert_eq!(products[0].percentage, 0.0);

    // Deepest tier wins
    assert_eq!(products[1].prod_id, "2");
    assert_eq!(products[1].percentage, 30.0);
    assert_eq!(products[1].price, Some(350.0));
    assert_eq!(products[1].savings, 150.0);

    assert_eq!(products[2].price, Some(42.5));
    assert!(products
        .iter()
        .all(|p| p.cat_id == "7" && p.url.contains(PRODUCT_PATH)));

    assert!(data_dir.path().join("30%").is_dir());
    assert!(data_dir.path().join("other").is_dir());

    let scraped = fs::read_to_string(diag_dir.path().join("scraped.txt")).unwrap();
    assert_eq!(scraped.lines().count(), 3);
    let urls = fs::read_to_string(diag_dir.path().join("urls.txt")).unwrap();
    assert_eq!(urls.lines().count(), 6);
}

#[tokio::test]
async fn test_error_page_redirect_skips_product() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="productSelected.do?prodId=1&amp;catId=7">1</a>
               <a href="productSelected.do?prodId=2&amp;catId=7">2</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PRODUCT_PATH))
        .and(query_param("prodId", "1"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", ERROR_PAGE_PATH))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PRODUCT_PATH))
        .and(query_param("prodId", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page(2, "R9.99", false)))
        .mount(&server)
        .await;

    // The error page itself is never requested
    Mock::given(method("GET"))
        .and(path(ERROR_PAGE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri());
    let crawler = Crawler::from_config(&config, Box::new(DirectoryWriter::new(data_dir.path())))
        .unwrap();

    let report = crawler.run(&config.site.start_url).await.unwrap();

    assert_eq!(report.products_emitted, 1);
    assert_eq!(report.count(PageState::ErrorPage), 1);
    assert_eq!(report.retries, 0);

    let products = sorted_products(data_dir.path());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].prod_id, "2");
}

#[tokio::test]
async fn test_followed_redirect_reaches_product() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", "/web/shop/categorySelected.do?catId=7"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="productSelected.do?prodId=5&amp;catId=7">5</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PRODUCT_PATH))
        .and(query_param("prodId", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page(5, "R1.00", false)))
        .mount(&server)
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri());
    let crawler = Crawler::from_config(&config, Box::new(DirectoryWriter::new(data_dir.path())))
        .unwrap();

    let report = crawler.run(&config.site.start_url).await.unwrap();

    assert_eq!(report.products_emitted, 1);
    assert_eq!(sorted_products(data_dir.path())[0].prod_id, "5");
}

#[tokio::test]
async fn test_persistent_server_error_aborts_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(ResponseTemplate::new(503))
        // Initial attempt plus max_retries
        .expect(3)
        .mount(&server)
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri());
    let crawler = Crawler::from_config(&config, Box::new(DirectoryWriter::new(data_dir.path())))
        .unwrap();

    let result = crawler.run(&config.site.start_url).await;

    match result {
        Err(DealzError::RetryBudgetExceeded { max_retries, .. }) => assert_eq!(max_retries, 2),
        other => panic!("expected retry budget error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_cached_responses_are_replayed() {
    let server = MockServer::start().await;
    // Every page is served once across both crawls
    mount_catalog(&server, 1).await;

    let cache_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri());
    config.output.cache_dir = Some(cache_dir.path().to_path_buf());

    for _ in 0..2 {
        let data_dir = TempDir::new().unwrap();
        let crawler =
            Crawler::from_config(&config, Box::new(DirectoryWriter::new(data_dir.path())))
                .unwrap();

        let report = crawler.run(&config.site.start_url).await.unwrap();
        assert_eq!(report.products_emitted, 3);
        assert_eq!(sorted_products(data_dir.path())[1].percentage, 30.0);
    }
}
