//! Integration tests for discovery, the run ledger and org sweeps

use crate::{config_with, html, Harness, HOT_PAGE};
use chrono::{TimeZone, Utc};
use lead_crawler::config::{Config, PlansConfig, SweepConfig};
use lead_crawler::output::{load_statistics, persist_run, write_lead_report, RunSummary};
use lead_crawler::providers::{SearchProvider, StaticSeedProvider};
use lead_crawler::queue::SharedTaskQueue;
use lead_crawler::storage::{open_storage, LeadLedger, RunStatus, SqliteStore};
use lead_crawler::sweep::{OrgProfile, OrgStore, SweepOutcome, TaskKind};
use lead_crawler::{
    CrawlScheduler, CrawlStatus, LeadRouter, LeadTier, OrgSweepScheduler, PlanTier, TaskEnvelope,
};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config whose single source answers every query with the mock server's pages
fn discovery_config(base_url: &str, free_tier: bool) -> Config {
    config_with(&format!(
        r#"
[crawler]
per-host-delay-ms = 10

[discovery]
pacing-min-ms = 0
pacing-max-ms = 0

[intent]
focuses = ["stretch wrap"]

[[intent.geo]]
country = "Canada"

[intent.weights]
demand = 1.0
procurement = 0.0
ops = 0.0
reputation = 0.0
urgency = 0.0

[[sources]]
id = "imports"
kind = "imports"
free-tier = {free_tier}
relevance = 0.8
urls = ["{base}/", "{base}/about"]
"#,
        base = base_url,
        free_tier = free_tier,
    ))
}

fn providers(config: &Config) -> Vec<Arc<dyn SearchProvider>> {
    config
        .sources
        .iter()
        .map(|entry| Arc::new(StaticSeedProvider::from_entry(entry)) as Arc<dyn SearchProvider>)
        .collect()
}

#[tokio::test]
async fn test_discover_crawl_route_and_report() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(HOT_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = open_storage(&dir.path().join("leads.db")).unwrap();
    let config = discovery_config(&mock_server.uri(), true);
    let run_id = store.create_run("cafebabe", PlanTier::Free).unwrap();
    let started_at = Utc::now();

    let harness = Harness::new(&config);
    let scheduler = CrawlScheduler::from_config(&config, providers(&config), Arc::clone(&harness.worker));
    let discovery = scheduler
        .discover_and_schedule(&config.intent, PlanTier::Free)
        .await;

    assert!(discovery.queries > 0);
    // One provider answers each query once
    assert_eq!(discovery.provider_calls, discovery.queries);
    assert_eq!(discovery.provider_failures, 0);
    // Every result shares one host, so only the first URL survives the merge
    assert_eq!(discovery.seeds, 1);
    assert_eq!(discovery.scheduled.len(), 1);
    let task = &discovery.scheduled[0];
    assert_eq!(task.url.as_str(), format!("{}/", mock_server.uri()));
    assert_eq!(task.timeout_ms, config.plans.free.timeout_ms);
    assert_eq!(task.byte_budget, config.plans.free.byte_budget);

    harness.drain().await;
    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), CrawlStatus::Ok);

    let leads = LeadRouter::new().route_results(&results, &config.intent);
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].decision.tier, LeadTier::Hot);
    assert!(leads[0].decision.score >= 80);
    assert_eq!(leads[0].decision.match_fraction, 1.0);

    persist_run(&store, run_id, &results, &leads).unwrap();

    let summary = RunSummary::new(PlanTier::Free, "cafebabe", started_at, &discovery, &results)
        .with_run_id(run_id);
    let report_path = dir.path().join("out").join("leads.md");
    write_lead_report(&summary, &leads, &report_path).unwrap();

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("## Hot Leads (1)"));
    assert!(report.contains("Acme Supply"));
    assert!(report.contains("| ok | 1 |"));

    let stats = load_statistics(&store).unwrap();
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.latest_run.unwrap().status, RunStatus::Completed);
    assert_eq!(stats.leads_by_tier.get(&LeadTier::Hot), Some(&1));
    assert_eq!(stats.unique_websites, 1);

    let stored = store.get_leads(run_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].company_guess.as_deref(), Some("Acme Supply"));
}

#[tokio::test]
async fn test_paid_only_source_unused_on_free_plan() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(HOT_PAGE))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = discovery_config(&mock_server.uri(), false);
    let harness = Harness::new(&config);
    let scheduler = CrawlScheduler::from_config(&config, providers(&config), Arc::clone(&harness.worker));

    let discovery = scheduler
        .discover_and_schedule(&config.intent, PlanTier::Free)
        .await;

    assert!(discovery.queries > 0);
    assert_eq!(discovery.provider_calls, 0);
    assert!(discovery.scheduled.is_empty());
    // The worker is started even with nothing to do
    assert!(harness.worker.is_running());

    harness.drain().await;
    assert!(harness.results().is_empty());
}

#[tokio::test]
async fn test_sweep_over_stored_orgs() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let mut busy = OrgProfile::new("org-1", PlanTier::Scale);
    busy.daily_discovery_target = 48;
    busy.daily_refresh_target = 24;
    store.upsert_org(&busy).unwrap();

    let mut dormant = OrgProfile::new("org-2", PlanTier::Pro);
    dormant.active = false;
    store.upsert_org(&dormant).unwrap();

    let queue = SharedTaskQueue::<TaskEnvelope>::new();
    let sweeper = OrgSweepScheduler::new(
        SweepConfig::default(),
        PlansConfig::default(),
        store.clone(),
        Arc::new(queue.clone()),
    );

    let at = Utc.with_ymd_and_hms(2026, 3, 10, 1, 0, 0).unwrap();
    let report = sweeper.sweep_once(at).await.unwrap();

    assert_eq!(report.decisions.len(), 1);
    assert_eq!(report.decisions[0].org_id, "org-1");
    assert_eq!(
        report.decisions[0].outcome,
        SweepOutcome::Enqueued {
            discovery: 2,
            refresh: 1
        }
    );
    assert_eq!(queue.size(Some("org-1")), 3);
    assert_eq!(queue.size(Some("org-2")), 0);

    let envelope = queue.pop_ready(at + chrono::Duration::minutes(1)).unwrap();
    assert_eq!(envelope.kind, TaskKind::Discover);
    assert_eq!(envelope.plan_tier, PlanTier::Scale);

    let saved = store.get_org("org-1").await.unwrap().unwrap();
    assert_eq!(saved.last_discovery, Some(at));
    assert_eq!(saved.last_refresh, Some(at));
}
