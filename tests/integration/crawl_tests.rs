//! Integration tests for the crawl worker
//!
//! These tests use wiremock to serve pages and robots.txt, and run tasks
//! through the worker end to end.

use crate::{config_with, html, Harness, HOT_PAGE};
use lead_crawler::feedback::{FeedbackLogger, DEFAULT_FEEDBACK_CAPACITY};
use lead_crawler::storage::{LeadLedger, SqliteStore};
use lead_crawler::{CrawlStatus, CrawlTask, PlanTier};
use std::sync::Arc;
use std::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAST: &str = "[crawler]\nper-host-delay-ms = 10\n";

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_produces_lead() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(HOT_PAGE))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    let task = CrawlTask::new(&format!("{}/", mock_server.uri()), PlanTier::Pro)
        .unwrap()
        .with_budgets(5_000, 64 * 1024);
    assert!(harness.worker.enqueue(task));
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert_eq!(result.status(), CrawlStatus::Ok);
    assert!(result.reason.is_none());
    assert_eq!(result.http.as_ref().unwrap().status, 200);

    let lead = result.lead().unwrap();
    assert_eq!(lead.website, format!("{}/", mock_server.uri()));
    assert_eq!(lead.company_guess.as_deref(), Some("Acme Supply"));
    assert!(lead.signals.has_cart);
    assert!(lead.signals.platforms.iter().any(|p| p == "shopify"));
    assert!(lead.signals.emails.iter().any(|e| e == "sales@acmesupply.ca"));

    // Paid plans keep the full page text, contact details included
    let excerpt = result.raw_excerpt.as_deref().unwrap();
    assert!(excerpt.contains("sales@acmesupply.ca"));
}

#[tokio::test]
async fn test_free_plan_excerpt_redacted() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(HOT_PAGE))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    let task = CrawlTask::new(&format!("{}/", mock_server.uri()), PlanTier::Free).unwrap();
    harness.worker.enqueue(task);
    harness.run_to_idle().await;

    let results = harness.results();
    let excerpt = results[0].raw_excerpt.as_deref().unwrap();
    assert!(!excerpt.contains("sales@acmesupply.ca"));
    assert!(excerpt.contains("[email]"));
    assert!(excerpt.chars().count() <= 500);
}

#[tokio::test]
async fn test_non_html_is_skipped() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/catalog.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    let task = CrawlTask::new(&format!("{}/catalog.pdf", mock_server.uri()), PlanTier::Pro).unwrap();
    harness.worker.enqueue(task);
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), CrawlStatus::Skipped);
    assert!(results[0].lead().is_none());
    assert!(results[0]
        .reason
        .as_deref()
        .unwrap()
        .starts_with("content rejected: non-HTML content type application/pdf"));
}

#[tokio::test]
async fn test_body_cut_at_byte_budget() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    let filler = "<p>stretch wrap in bulk</p>".repeat(4_000);
    let page = format!("<html><body>{}</body></html>", filler);
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(html(&page))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    let task = CrawlTask::new(&format!("{}/big", mock_server.uri()), PlanTier::Pro)
        .unwrap()
        .with_budgets(5_000, 2_048);
    harness.worker.enqueue(task);
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results[0].status(), CrawlStatus::Ok);
    assert!(results[0].http.as_ref().unwrap().bytes <= 2_048);
    assert!(results[0]
        .lead()
        .unwrap()
        .signals
        .packaging_keywords
        .iter()
        .any(|k| k == "stretch wrap"));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nDisallow: /private").await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(html("<html><body>Open page</body></html>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/pricing"))
        .respond_with(html("<html><body>Secret</body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    for page in ["/public", "/private/pricing"] {
        let task = CrawlTask::new(&format!("{}{}", mock_server.uri(), page), PlanTier::Pro).unwrap();
        assert!(harness.worker.enqueue(task));
    }
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results.len(), 2);

    let private = results.iter().find(|r| r.url.ends_with("/private/pricing")).unwrap();
    assert_eq!(private.status(), CrawlStatus::Skipped);
    assert_eq!(
        private.reason.as_deref(),
        Some("policy denied: disallowed by robots.txt")
    );
    assert!(private.http.is_none());

    let public = results.iter().find(|r| r.url.ends_with("/public")).unwrap();
    assert_eq!(public.status(), CrawlStatus::Ok);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nDisallow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>Hello</body></html>"))
        .mount(&mock_server)
        .await;

    let config = config_with("[crawler]\nper-host-delay-ms = 10\nrespect-robots = false\n");
    let harness = Harness::new(&config);
    harness
        .worker
        .enqueue(CrawlTask::new(&format!("{}/", mock_server.uri()), PlanTier::Pro).unwrap());
    harness.run_to_idle().await;

    assert_eq!(harness.results()[0].status(), CrawlStatus::Ok);
}

#[tokio::test]
async fn test_http_error_status() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    harness
        .worker
        .enqueue(CrawlTask::new(&format!("{}/gone", mock_server.uri()), PlanTier::Pro).unwrap());
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results[0].status(), CrawlStatus::Error);
    assert_eq!(results[0].reason.as_deref(), Some("HTTP status 404"));
    assert_eq!(results[0].http.as_ref().unwrap().status, 404);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<html></html>").set_delay(std::time::Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(&config_with(FAST));
    let task = CrawlTask::new(&format!("{}/slow", mock_server.uri()), PlanTier::Pro)
        .unwrap()
        .with_budgets(200, 64 * 1024);
    harness.worker.enqueue(task);
    harness.run_to_idle().await;

    let results = harness.results();
    assert_eq!(results[0].status(), CrawlStatus::Error);
    assert_eq!(
        results[0].reason.as_deref(),
        Some("fetch timed out after 200 ms")
    );
}

#[tokio::test]
async fn test_duplicate_url_variants_rejected() {
    let mock_server = MockServer::start().await;
    let harness = Harness::new(&config_with(FAST));

    let tracked = CrawlTask::new(
        &format!("{}/products?utm_source=newsletter", mock_server.uri()),
        PlanTier::Free,
    )
    .unwrap();
    let plain = CrawlTask::new(&format!("{}/products/", mock_server.uri()), PlanTier::Free).unwrap();

    assert!(harness.worker.enqueue(tracked));
    assert!(!harness.worker.enqueue(plain));
    assert_eq!(harness.worker.queued(), 1);
}

#[tokio::test]
async fn test_higher_priority_fetched_first() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    for page in ["/low", "/high", "/mid"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("<html><body>page</body></html>"))
            .mount(&mock_server)
            .await;
    }

    let harness = Harness::new(&config_with(FAST));
    for (page, priority) in [("/low", 10), ("/high", 50), ("/mid", 30)] {
        let task = CrawlTask::new(&format!("{}{}", mock_server.uri(), page), PlanTier::Pro)
            .unwrap()
            .with_priority(priority);
        harness.worker.enqueue(task);
    }
    harness.run_to_idle().await;

    let order: Vec<i64> = harness.results().iter().map(|r| r.priority).collect();
    assert_eq!(order, vec![50, 30, 10]);
}

#[tokio::test]
async fn test_same_host_fetches_are_spaced() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    for page in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("<html><body>page</body></html>"))
            .mount(&mock_server)
            .await;
    }

    let harness = Harness::new(&config_with("[crawler]\nper-host-delay-ms = 1000\n"));
    for page in ["/a", "/b"] {
        harness
            .worker
            .enqueue(CrawlTask::new(&format!("{}{}", mock_server.uri(), page), PlanTier::Pro).unwrap());
    }

    let started = Instant::now();
    harness.run_to_idle().await;

    assert_eq!(harness.results().len(), 2);
    assert!(started.elapsed().as_millis() >= 1000);
}

#[tokio::test]
async fn test_feedback_reaches_ledger() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(HOT_PAGE))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (feedback, writer) = FeedbackLogger::spawn(store.clone(), DEFAULT_FEEDBACK_CAPACITY);

    let harness = Harness::with_feedback(&config_with(FAST), feedback);
    for page in ["/", "/missing"] {
        harness
            .worker
            .enqueue(CrawlTask::new(&format!("{}{}", mock_server.uri(), page), PlanTier::Pro).unwrap());
    }
    harness.run_to_idle().await;

    // The writer drains and exits once the worker's logger is gone
    drop(harness);
    writer.await.unwrap();

    assert_eq!(store.count_ingestion().unwrap(), (1, 1));
}
