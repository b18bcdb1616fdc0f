//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the lead ledger.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    plan_tier TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per terminal crawl outcome
CREATE TABLE IF NOT EXISTS crawl_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    reason TEXT,
    http_status INTEGER,
    bytes INTEGER,
    content_type TEXT,
    plan_tier TEXT NOT NULL,
    priority INTEGER NOT NULL,
    org_id TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_run ON crawl_results(run_id);
CREATE INDEX IF NOT EXISTS idx_results_status ON crawl_results(status);

-- Routed leads, one per website and run
CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    website TEXT NOT NULL,
    company_guess TEXT,
    tier TEXT NOT NULL,
    score INTEGER NOT NULL,
    match_fraction REAL NOT NULL,
    decision_json TEXT NOT NULL,
    signals_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(run_id, website)
);

CREATE INDEX IF NOT EXISTS idx_leads_tier ON leads(tier);
CREATE INDEX IF NOT EXISTS idx_leads_score ON leads(score);

-- Ingestion feedback events
CREATE TABLE IF NOT EXISTS ingestion_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    ok INTEGER NOT NULL,
    http_status INTEGER,
    bytes INTEGER,
    reason TEXT,
    logged_at TEXT NOT NULL
);

-- Organization profiles for the sweep loop
CREATE TABLE IF NOT EXISTS orgs (
    id TEXT PRIMARY KEY,
    plan_tier TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    profile_json TEXT NOT NULL,
    last_discovery TEXT,
    last_refresh TEXT
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
