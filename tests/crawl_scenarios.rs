//! End-to-end crawl/persistence scenarios driven against an in-process HTTP
//! fixture, following the wiremock pattern used for crawler integration
//! tests elsewhere in the example corpus (mock the origin, seed the engine
//! with the mock's own URI, assert on what actually got fetched).

use std::sync::Arc;
use std::time::Duration;

use llmxt::crawler::{CrawlEngine, RateLimitedFetcher, RobotsChecker};
use llmxt::models::{CrawlConfig, Job};
use llmxt::storage::{StorageClient, StorageConfig};
use llmxt::{composer, ranker};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_config(language: &str) -> CrawlConfig {
    CrawlConfig {
        max_pages: 20,
        max_depth: 3,
        request_delay_seconds: 0.0,
        user_agent: "llmxt-test/1.0".to_string(),
        respect_robots: true,
        follow_redirects: true,
        timeout_seconds: 5,
        language: language.to_string(),
    }
}

fn fetcher() -> RateLimitedFetcher {
    RateLimitedFetcher::new(1000, 5, "llmxt-test/1.0")
}

fn page_html(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{l}">{l}</a>"#))
        .collect();
    format!(
        r#"<html lang="en"><head><title>{title}</title></head><body><main><h1>{title}</h1><p>Documentation content for {title}.</p>{anchors}</main></body></html>"#
    )
}

/// Scenario: a sitemap index referencing a child sitemap is recursed, and
/// every page it declares is crawled.
#[tokio::test]
async fn sitemap_index_discovery_crawls_every_declared_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    let sitemap_index = format!(
        r#"<?xml version="1.0"?><sitemapindex><sitemap><loc>{base}/sitemap-1.xml</loc></sitemap></sitemapindex>"#
    );
    let child_sitemap = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{base}/docs</loc></url><url><loc>{base}/docs/guide</loc></url></urlset>"#
    );

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap_index.into_bytes(), "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(child_sitemap.into_bytes(), "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Docs Home", &[]).into_bytes(),
            "text/html",
        ))
        .mount(&server)
        .await;
    let guide_guard = Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Guide", &[]).into_bytes(),
            "text/html",
        ))
        .mount_as_scoped(&server)
        .await;

    let robots = RobotsChecker::from_content(&format!("Sitemap: {base}/sitemap_index.xml\n"));
    let engine = CrawlEngine::new(fetcher(), Some(robots), base_config("en"));
    let cancel = CancellationToken::new();

    let seed = format!("{base}/docs");
    let result = engine.crawl(&seed, &cancel, |_| {}).await.expect("crawl succeeds");

    assert_eq!(result.pages.len(), 2, "sitemap index child should be recursed");
    assert!(result.pages.iter().any(|p| p.url.ends_with("/docs/guide")));
    assert_eq!(guide_guard.received_requests().await.len(), 1);
}

/// Scenario: a robots.txt Disallow rule keeps matching pages out of the
/// crawl entirely — they are never even requested.
#[tokio::test]
async fn robots_disallow_blocks_matching_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Docs Home", &["/docs/guide", "/docs/private/secrets"]).into_bytes(),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Guide", &[]).into_bytes(),
            "text/html",
        ))
        .mount(&server)
        .await;
    let private_guard = Mock::given(method("GET"))
        .and(path("/docs/private/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Secret", &[]).into_bytes(),
            "text/html",
        ))
        .mount_as_scoped(&server)
        .await;

    let robots = RobotsChecker::from_content("User-agent: *\nDisallow: /docs/private\n");
    let engine = CrawlEngine::new(fetcher(), Some(robots), base_config("en"));
    let cancel = CancellationToken::new();

    let seed = format!("{base}/docs");
    let result = engine.crawl(&seed, &cancel, |_| {}).await.expect("crawl succeeds");

    assert!(result.pages.iter().all(|p| !p.url.contains("/docs/private")));
    assert!(result.blocked_urls.iter().any(|u| u.contains("/docs/private")));
    assert_eq!(private_guard.received_requests().await.len(), 0);
}

/// Scenario: with an English-only config, non-English-locale pages declared
/// in the sitemap are filtered out before they're ever fetched.
#[tokio::test]
async fn non_english_locale_pages_are_filtered_before_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{base}/docs</loc></url><url><loc>{base}/fr-fr/docs</loc></url></urlset>"#
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap.into_bytes(), "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Docs Home", &[]).into_bytes(),
            "text/html",
        ))
        .mount(&server)
        .await;
    let fr_guard = Mock::given(method("GET"))
        .and(path("/fr-fr/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Docs Accueil", &[]).into_bytes(),
            "text/html",
        ))
        .mount_as_scoped(&server)
        .await;

    let robots = RobotsChecker::from_content(&format!("Sitemap: {base}/sitemap.xml\n"));
    let engine = CrawlEngine::new(fetcher(), Some(robots), base_config("en"));
    let cancel = CancellationToken::new();

    let seed = format!("{base}/docs");
    let result = engine.crawl(&seed, &cancel, |_| {}).await.expect("crawl succeeds");

    assert!(result.pages.iter().all(|p| !p.url.contains("/fr-fr/")));
    assert_eq!(fr_guard.received_requests().await.len(), 0);
}

/// Scenario: a page whose extracted body is far larger than the byte budget
/// still gets composed into output that respects the budget, via truncation
/// rather than silent overflow.
#[tokio::test]
async fn budget_compression_truncates_oversized_crawl_output() {
    let server = MockServer::start().await;
    let base = server.uri();

    let huge_paragraph = "word ".repeat(60_000);
    let html = format!(
        r#"<html lang="en"><head><title>Huge</title></head><body><main><h1>Huge</h1><p>{huge_paragraph}</p></main></body></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.into_bytes(), "text/html"))
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(fetcher(), None, base_config("en"));
    let cancel = CancellationToken::new();
    let seed = format!("{base}/docs");
    let result = engine.crawl(&seed, &cancel, |_| {}).await.expect("crawl succeeds");
    assert_eq!(result.pages.len(), 1);

    let ranked = ranker::rank(result.pages);
    let max_kb = 20;
    let output = composer::compose_llm_txt(&ranked, max_kb, None).await;
    assert!(output.len() <= max_kb as usize * 1024);
}

/// Scenario: cancelling mid-crawl lets an already-in-flight fetch finish but
/// stops the next one from ever being requested.
#[tokio::test]
async fn cancellation_mid_crawl_stops_further_fetches() {
    let server = MockServer::start().await;
    let base = server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{base}/docs</loc></url><url><loc>{base}/docs/a</loc></url><url><loc>{base}/docs/b</loc></url></urlset>"#
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap.into_bytes(), "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("Docs Home", &[]).into_bytes(),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(page_html("A", &[]).into_bytes(), "text/html")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let never_guard = Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page_html("B", &[]).into_bytes(),
            "text/html",
        ))
        .mount_as_scoped(&server)
        .await;

    let robots = RobotsChecker::from_content(&format!("Sitemap: {base}/sitemap.xml\n"));
    let mut config = base_config("en");
    config.request_delay_seconds = 0.0;
    let engine = Arc::new(CrawlEngine::new(fetcher(), Some(robots), config));
    let cancel = CancellationToken::new();
    let seed = format!("{base}/docs");

    let cancel_for_task = cancel.clone();
    let engine_for_task = engine.clone();
    let handle = tokio::spawn(async move {
        engine_for_task
            .crawl(&seed, &cancel_for_task, |_| {})
            .await
    });

    // Let /docs and the in-flight /docs/a fetch get underway, then cancel
    // before /docs/a's 300ms delay resolves.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = handle.await.expect("task join").expect("crawl result");
    assert!(result.pages.iter().any(|p| p.url.ends_with("/docs")));
    assert!(result.pages.iter().any(|p| p.url.ends_with("/docs/a")));
    assert!(result.pages.iter().all(|p| !p.url.ends_with("/docs/b")));
    assert_eq!(never_guard.received_requests().await.len(), 0);
}

/// Scenario: a job snapshot saved to object storage round-trips through the
/// real gzip+JSON wire format when loaded back.
#[tokio::test]
async fn job_persistence_round_trips_through_object_storage() {
    let server = MockServer::start().await;

    let config = CrawlConfig::default();
    let job = Job::new("job-roundtrip".to_string(), "https://example.com".to_string(), &config, false, 0.0);

    let put_guard = Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount_as_scoped(&server)
        .await;

    let storage = StorageClient::new(StorageConfig {
        endpoint: server.uri(),
        access_key: "test-key".to_string(),
        secret_key: "test-secret".to_string(),
        bucket: "llmxt-test".to_string(),
        region: "auto".to_string(),
    });

    storage.save_job(&job).await.expect("save_job succeeds");
    let put_requests = put_guard.received_requests().await;
    assert_eq!(put_requests.len(), 1);
    let uploaded_body = put_requests[0].body.clone();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(uploaded_body, "application/json"))
        .mount(&server)
        .await;

    let loaded = storage.load_job(&job.job_id).await.expect("load_job succeeds");
    assert_eq!(loaded.job_id, job.job_id);
    assert_eq!(loaded.url, job.url);
    assert_eq!(loaded.status, job.status);
}
