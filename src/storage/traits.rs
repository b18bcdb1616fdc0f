//! Storage traits and error types

use crate::crawler::{CrawlResult, CrawlStatus};
use crate::model::PlanTier;
use crate::router::{LeadTier, RoutedLead};
use crate::storage::{LeadRecord, RunRecord, RunStatus};
use crate::sweep::OrgProfile;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Run ledger, routed leads, org profiles and the statistics read back from them
///
/// Implementations synchronize internally; every method takes `&self`.
pub trait LeadLedger: Send + Sync {
    // Runs

    /// Starts a run and returns its id
    fn create_run(&self, config_hash: &str, plan_tier: PlanTier) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // Results and leads

    fn record_result(&self, run_id: i64, result: &CrawlResult) -> StorageResult<()>;

    /// Stores a routed lead; a second lead for the same website in one run
    /// replaces the first
    fn record_lead(&self, run_id: i64, lead: &RoutedLead) -> StorageResult<()>;

    /// Leads of a run, best score first
    fn get_leads(&self, run_id: i64) -> StorageResult<Vec<LeadRecord>>;

    // Orgs

    fn upsert_org(&self, org: &OrgProfile) -> StorageResult<()>;

    fn load_orgs(&self, active_only: bool) -> StorageResult<Vec<OrgProfile>>;

    // Statistics

    fn count_runs(&self) -> StorageResult<u64>;

    fn count_results_by_status(&self) -> StorageResult<HashMap<CrawlStatus, u64>>;

    fn count_leads_by_tier(&self) -> StorageResult<HashMap<LeadTier, u64>>;

    fn count_unique_websites(&self) -> StorageResult<u64>;

    /// Ingestion events as `(ok, failed)`
    fn count_ingestion(&self) -> StorageResult<(u64, u64)>;

    /// Most frequent failure reasons with their counts
    fn top_failure_reasons(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;
}
