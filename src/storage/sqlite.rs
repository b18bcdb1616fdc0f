//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of [`LeadLedger`],
//! plus the [`IngestionSink`] and [`OrgStore`] collaborator seams.

use crate::crawler::{CrawlResult, CrawlStatus};
use crate::feedback::{IngestionEvent, IngestionSink};
use crate::model::PlanTier;
use crate::router::{LeadRouteDecision, LeadTier, RoutedLead};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LeadLedger, StorageError, StorageResult};
use crate::storage::{LeadRecord, RunRecord, RunStatus};
use crate::sweep::{OrgMeta, OrgProfile, OrgStore};
use crate::LeadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
///
/// The connection sits behind a mutex so the store can be shared through an
/// `Arc` with the feedback writer and the sweep loop.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> Result<Self, LeadError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, LeadError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_ingestion(&self, event: &IngestionEvent) -> StorageResult<()> {
        self.conn().execute(
            "INSERT INTO ingestion_log (url, ok, http_status, bytes, reason, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.url,
                event.ok,
                event.status,
                event.bytes.map(to_i64),
                event.reason,
                event.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn update_org_meta(&self, id: &str, meta: &OrgMeta) -> StorageResult<()> {
        self.conn().execute(
            "UPDATE orgs SET last_discovery = COALESCE(?1, last_discovery),
             last_refresh = COALESCE(?2, last_refresh) WHERE id = ?3",
            params![
                meta.last_discovery.map(|t| t.to_rfc3339()),
                meta.last_refresh.map(|t| t.to_rfc3339()),
                id
            ],
        )?;
        Ok(())
    }

    fn find_org(&self, id: &str) -> StorageResult<Option<OrgProfile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT profile_json, last_discovery, last_refresh FROM orgs WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .optional()?;

        row.map(|(json, discovery, refresh)| org_from_parts(&json, discovery, refresh))
            .transpose()
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn parse_crawl_status(s: &str) -> Option<CrawlStatus> {
    [CrawlStatus::Ok, CrawlStatus::Skipped, CrawlStatus::Error]
        .into_iter()
        .find(|status| status.as_str() == s)
}

fn parse_lead_tier(s: &str) -> Option<LeadTier> {
    [LeadTier::Skip, LeadTier::Warm, LeadTier::Hot]
        .into_iter()
        .find(|tier| tier.as_str() == s)
}

/// Stored profile JSON with the metadata columns laid over it
fn org_from_parts(
    json: &str,
    last_discovery: Option<String>,
    last_refresh: Option<String>,
) -> StorageResult<OrgProfile> {
    let mut org: OrgProfile = serde_json::from_str(json)?;
    if let Some(t) = parse_time(last_discovery) {
        org.last_discovery = Some(t);
    }
    if let Some(t) = parse_time(last_refresh) {
        org.last_refresh = Some(t);
    }
    Ok(org)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        plan_tier: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(PlanTier::Free),
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

impl LeadLedger for SqliteStore {
    fn create_run(&self, config_hash: &str, plan_tier: PlanTier) -> StorageResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, plan_tier, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                plan_tier.as_str(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, plan_tier, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, plan_tier, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn record_result(&self, run_id: i64, result: &CrawlResult) -> StorageResult<()> {
        let http = result.http.as_ref();
        self.conn().execute(
            "INSERT INTO crawl_results (run_id, url, status, reason, http_status, bytes,
             content_type, plan_tier, priority, org_id, started_at, finished_at, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                run_id,
                result.url,
                result.status().as_str(),
                result.reason,
                http.map(|h| h.status),
                http.map(|h| to_i64(h.bytes)),
                http.and_then(|h| h.content_type.clone()),
                result.plan_tier.as_str(),
                result.priority,
                result.org_id,
                result.started_at.to_rfc3339(),
                result.finished_at.to_rfc3339(),
                result.duration_ms()
            ],
        )?;
        Ok(())
    }

    fn record_lead(&self, run_id: i64, lead: &RoutedLead) -> StorageResult<()> {
        let decision_json = serde_json::to_string(&lead.decision)?;
        let signals_json = serde_json::to_string(&lead.lead.signals)?;

        self.conn().execute(
            "INSERT INTO leads (run_id, url, website, company_guess, tier, score, match_fraction,
             decision_json, signals_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(run_id, website) DO UPDATE SET
                url = excluded.url,
                company_guess = excluded.company_guess,
                tier = excluded.tier,
                score = excluded.score,
                match_fraction = excluded.match_fraction,
                decision_json = excluded.decision_json,
                signals_json = excluded.signals_json,
                created_at = excluded.created_at",
            params![
                run_id,
                lead.url,
                lead.lead.website,
                lead.lead.company_guess,
                lead.decision.tier.as_str(),
                lead.decision.score,
                lead.decision.match_fraction,
                decision_json,
                signals_json,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn get_leads(&self, run_id: i64) -> StorageResult<Vec<LeadRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT url, website, company_guess, decision_json, created_at
             FROM leads WHERE run_id = ?1 ORDER BY score DESC, id ASC",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, website, company_guess, decision_json, created_at)| -> StorageResult<LeadRecord> {
                let decision: LeadRouteDecision = serde_json::from_str(&decision_json)?;
                Ok(LeadRecord {
                    run_id,
                    url,
                    website,
                    company_guess,
                    tier: decision.tier,
                    score: decision.score,
                    match_fraction: decision.match_fraction,
                    preferred_channels: decision.preferred_channels,
                    next_actions: decision.next_actions,
                    reasons: decision.reasons,
                    created_at,
                })
            })
            .collect()
    }

    fn upsert_org(&self, org: &OrgProfile) -> StorageResult<()> {
        let json = serde_json::to_string(org)?;
        self.conn().execute(
            "INSERT INTO orgs (id, plan_tier, active, profile_json, last_discovery, last_refresh)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                plan_tier = excluded.plan_tier,
                active = excluded.active,
                profile_json = excluded.profile_json",
            params![
                org.id,
                org.plan_tier.as_str(),
                org.active,
                json,
                org.last_discovery.map(|t| t.to_rfc3339()),
                org.last_refresh.map(|t| t.to_rfc3339())
            ],
        )?;
        Ok(())
    }

    fn load_orgs(&self, active_only: bool) -> StorageResult<Vec<OrgProfile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT profile_json, last_discovery, last_refresh FROM orgs
             WHERE active = 1 OR ?1 = 0 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![active_only], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(json, discovery, refresh)| org_from_parts(&json, discovery, refresh))
            .collect()
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_results_by_status(&self) -> StorageResult<HashMap<CrawlStatus, u64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM crawl_results GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (status, count) in rows {
            let status = parse_crawl_status(&status)
                .ok_or_else(|| StorageError::Corrupt(format!("crawl status '{}'", status)))?;
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    fn count_leads_by_tier(&self) -> StorageResult<HashMap<LeadTier, u64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT tier, COUNT(*) FROM leads GROUP BY tier")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (tier, count) in rows {
            let tier = parse_lead_tier(&tier)
                .ok_or_else(|| StorageError::Corrupt(format!("lead tier '{}'", tier)))?;
            counts.insert(tier, count as u64);
        }
        Ok(counts)
    }

    fn count_unique_websites(&self) -> StorageResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(DISTINCT website) FROM leads",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_ingestion(&self) -> StorageResult<(u64, u64)> {
        let (ok, failed): (i64, i64) = self.conn().query_row(
            "SELECT COALESCE(SUM(ok), 0), COALESCE(SUM(1 - ok), 0) FROM ingestion_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((ok as u64, failed as u64))
    }

    fn top_failure_reasons(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT reason, COUNT(*) AS n FROM crawl_results
             WHERE status != 'ok' AND reason IS NOT NULL
             GROUP BY reason ORDER BY n DESC, reason ASC LIMIT ?1",
        )?;
        let reasons = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reasons)
    }
}

#[async_trait]
impl IngestionSink for SqliteStore {
    async fn log_ingestion(&self, event: IngestionEvent) -> anyhow::Result<()> {
        self.insert_ingestion(&event)?;
        Ok(())
    }
}

#[async_trait]
impl OrgStore for SqliteStore {
    async fn list_active_orgs(&self) -> anyhow::Result<Vec<OrgProfile>> {
        Ok(self.load_orgs(true)?)
    }

    async fn get_org(&self, id: &str) -> anyhow::Result<Option<OrgProfile>> {
        Ok(self.find_org(id)?)
    }

    async fn set_org_meta(&self, id: &str, meta: OrgMeta) -> anyhow::Result<()> {
        self.update_org_meta(id, &meta)?;
        Ok(())
    }
}
