//! Integration tests for Lead-Crawler
//!
//! Each module drives the public API against wiremock servers, so fetches go
//! through the real reqwest transport and robots.txt handling.

mod crawl_tests;
mod discovery_tests;
mod routing_tests;

use lead_crawler::compliance::RobotsCache;
use lead_crawler::config::{parse_config, Config};
use lead_crawler::crawler::{build_http_client, CrawlWorker, ReqwestTransport, WorkerSettings};
use lead_crawler::feedback::FeedbackLogger;
use lead_crawler::CrawlResult;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::ResponseTemplate;

const BASE_CONFIG: &str = r#"
[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "./test_leads.db"
report-path = "./test_leads.md"
"#;

/// A page that reads as a strong stretch-wrap buyer
pub const HOT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Acme Supply | Home</title>
  <meta property="og:site_name" content="Acme Supply">
  <script src="https://cdn.shopify.com/s/files/1/theme.js"></script>
  <script>gtag('config', 'G-TEST1');</script>
</head>
<body>
  <h1>Stretch wrap for every pallet</h1>
  <p>We stock stretch film, pallet wrap and pallet film by the case.</p>
  <p>Switching from Uline? Request a quote or send us your RFQ.</p>
  <button>Add to cart</button>
  <p>Contact sales@acmesupply.ca</p>
</body>
</html>"#;

/// Builds a validated config from the base sections plus `extra` TOML
pub fn config_with(extra: &str) -> Config {
    parse_config(&format!("{}\n{}", BASE_CONFIG, extra)).expect("test config should parse")
}

/// An HTML response with an explicit content type
pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

/// A worker wired to the real HTTP stack, collecting every result
pub struct Harness {
    pub worker: Arc<CrawlWorker>,
    results: Arc<Mutex<Vec<CrawlResult>>>,
}

impl Harness {
    pub fn new(config: &Config) -> Self {
        Self::with_feedback(config, FeedbackLogger::disabled())
    }

    pub fn with_feedback(config: &Config, feedback: FeedbackLogger) -> Self {
        let client = build_http_client(&config.user_agent, &config.crawler)
            .expect("client should build");
        let robots = Arc::new(RobotsCache::new(
            client.clone(),
            config.user_agent.header_value(),
        ));

        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let worker = CrawlWorker::builder(
            WorkerSettings::from_config(config),
            Arc::new(ReqwestTransport::new(client)),
        )
        .robots(robots)
        .feedback(feedback)
        .on_result(move |result| sink.lock().unwrap().push(result))
        .build();

        Self {
            worker: Arc::new(worker),
            results,
        }
    }

    /// Starts the worker, waits until it has drained and stops it
    pub async fn run_to_idle(&self) {
        if !self.worker.is_running() {
            self.worker.start().expect("worker should start");
        }
        self.drain().await;
    }

    /// Waits for an already running worker to drain, then stops it
    pub async fn drain(&self) {
        tokio::time::timeout(Duration::from_secs(30), self.worker.wait_idle())
            .await
            .expect("worker should go idle");
        self.worker.stop();
        self.worker.join().await;
    }

    pub fn results(&self) -> Vec<CrawlResult> {
        self.results.lock().unwrap().clone()
    }
}
