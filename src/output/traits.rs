//! Output error and run summary types

use crate::crawler::{CrawlResult, CrawlStatus, DiscoveryReport};
use crate::model::PlanTier;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What one discover → crawl run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub plan_tier: PlanTier,

    // Discovery
    pub queries: usize,
    pub provider_calls: usize,
    pub provider_failures: usize,
    pub seeds: usize,
    pub scheduled: usize,

    // Crawl outcomes
    pub results_by_status: HashMap<CrawlStatus, u64>,
}

impl RunSummary {
    pub fn new(
        plan_tier: PlanTier,
        config_hash: impl Into<String>,
        started_at: DateTime<Utc>,
        discovery: &DiscoveryReport,
        results: &[CrawlResult],
    ) -> Self {
        let mut results_by_status = HashMap::new();
        for result in results {
            *results_by_status.entry(result.status()).or_insert(0) += 1;
        }

        Self {
            run_id: None,
            started_at,
            finished_at: Utc::now(),
            config_hash: config_hash.into(),
            plan_tier,
            queries: discovery.queries,
            provider_calls: discovery.provider_calls,
            provider_failures: discovery.provider_failures,
            seeds: discovery.seeds,
            scheduled: discovery.scheduled.len(),
            results_by_status,
        }
    }

    pub fn with_run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn count(&self, status: CrawlStatus) -> u64 {
        self.results_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total_results(&self) -> u64 {
        self.results_by_status.values().sum()
    }

    /// Share of results that produced a lead, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_results();
        if total == 0 {
            return 0.0;
        }
        (self.count(CrawlStatus::Ok) as f64 / total as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}
