//! Storage module for persisting pipeline data
//!
//! A SQLite-backed ledger that plays the collaborator roles the pipeline
//! expects:
//! - Run tracking, with the config hash of each run
//! - Crawl results and routed leads
//! - The ingestion feedback sink
//! - The org store read by the sweep loop

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{LeadLedger, StorageError, StorageResult};

use crate::model::PlanTier;
use crate::router::LeadTier;
use crate::LeadError;
use std::path::Path;

/// Opens (or creates) a ledger database
pub fn open_storage(path: &Path) -> Result<SqliteStore, LeadError> {
    SqliteStore::open(path)
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub plan_tier: PlanTier,
    pub status: RunStatus,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A routed lead as stored
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub run_id: i64,
    pub url: String,
    pub website: String,
    pub company_guess: Option<String>,
    pub tier: LeadTier,
    pub score: u8,
    pub match_fraction: f64,
    pub preferred_channels: Vec<String>,
    pub next_actions: Vec<String>,
    pub reasons: Vec<String>,
    pub created_at: String,
}
