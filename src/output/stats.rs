//! Statistics read back from the lead ledger

use crate::crawler::CrawlStatus;
use crate::router::LeadTier;
use crate::storage::{LeadLedger, RunRecord};
use std::collections::HashMap;

/// Number of failure reasons shown
const TOP_REASONS: usize = 10;

/// Ledger statistics summary
#[derive(Debug, Clone, Default)]
pub struct LeadStatistics {
    pub runs: u64,
    pub latest_run: Option<RunRecord>,

    /// Crawl results by terminal status
    pub results_by_status: HashMap<CrawlStatus, u64>,

    /// Routed leads by tier
    pub leads_by_tier: HashMap<LeadTier, u64>,

    pub unique_websites: u64,

    pub ingestion_ok: u64,
    pub ingestion_failed: u64,

    /// Most frequent failure reasons
    pub top_failures: Vec<(String, u64)>,
}

impl LeadStatistics {
    pub fn total_results(&self) -> u64 {
        self.results_by_status.values().sum()
    }

    /// Share of crawl results that produced a lead, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_results();
        if total == 0 {
            return 0.0;
        }
        let ok = self.results_by_status.get(&CrawlStatus::Ok).copied().unwrap_or(0);
        (ok as f64 / total as f64) * 100.0
    }
}

/// Loads statistics from the ledger
pub fn load_statistics(ledger: &dyn LeadLedger) -> Result<LeadStatistics, crate::LeadError> {
    let (ingestion_ok, ingestion_failed) = ledger.count_ingestion()?;

    Ok(LeadStatistics {
        runs: ledger.count_runs()?,
        latest_run: ledger.get_latest_run()?,
        results_by_status: ledger.count_results_by_status()?,
        leads_by_tier: ledger.count_leads_by_tier()?,
        unique_websites: ledger.count_unique_websites()?,
        ingestion_ok,
        ingestion_failed,
        top_failures: ledger.top_failure_reasons(TOP_REASONS)?,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &LeadStatistics) {
    println!("=== Lead Ledger Statistics ===\n");

    println!("Overview:");
    println!("  Runs: {}", stats.runs);
    if let Some(run) = &stats.latest_run {
        println!(
            "  Latest run: #{} ({}, {} plan, started {})",
            run.id,
            run.status.to_db_string(),
            run.plan_tier,
            run.started_at
        );
    }
    println!("  Crawl results: {}", stats.total_results());
    println!("  Unique lead websites: {}", stats.unique_websites);
    println!();

    println!("Results by Status:");
    for status in [CrawlStatus::Ok, CrawlStatus::Skipped, CrawlStatus::Error] {
        let count = stats.results_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_results() > 0 {
            (count as f64 / stats.total_results() as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Leads by Tier:");
    for tier in [LeadTier::Hot, LeadTier::Warm, LeadTier::Skip] {
        println!(
            "  {}: {}",
            tier,
            stats.leads_by_tier.get(&tier).copied().unwrap_or(0)
        );
    }
    println!();

    if !stats.top_failures.is_empty() {
        println!("Top Failure Reasons:");
        for (reason, count) in &stats.top_failures {
            println!("  {} x {}", count, reason);
        }
        println!();
    }

    println!(
        "Ingestion feedback: {} ok, {} failed",
        stats.ingestion_ok, stats.ingestion_failed
    );
    println!(
        "Success Rate: {:.1}% of crawl results produced a lead",
        stats.success_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlResult, CrawlTask, TaskFailure};
    use crate::model::PlanTier;
    use crate::storage::SqliteStore;
    use chrono::Utc;

    #[test]
    fn test_empty_ledger() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stats = load_statistics(&store).unwrap();

        assert_eq!(stats.runs, 0);
        assert!(stats.latest_run.is_none());
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_statistics_from_ledger() {
        let store = SqliteStore::open_in_memory().unwrap();
        let run_id = store.create_run("abc", PlanTier::Free).unwrap();
        let task = CrawlTask::new("https://acme.ca/", PlanTier::Free).unwrap();
        store
            .record_result(
                run_id,
                &CrawlResult::failed(&task, &TaskFailure::HttpStatus(404), None, Utc::now()),
            )
            .unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.latest_run.unwrap().id, run_id);
        assert_eq!(stats.results_by_status.get(&CrawlStatus::Error), Some(&1));
        assert_eq!(stats.top_failures, vec![("HTTP status 404".to_string(), 1)]);
    }
}
