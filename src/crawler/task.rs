//! Crawl work items and their outcomes

use crate::feedback::IngestionEvent;
use crate::model::{PlanTier, Region};
use crate::queue::QueueItem;
use crate::signals::ExtractedSignals;
use crate::url::{normalize_url, strip_fragment};
use crate::UrlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Where a seed came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedSource {
    UserWebsite,
    UserKeywords,
    Directories,
    Social,
    Imports,
    #[default]
    Search,
}

impl SeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserWebsite => "user-website",
            Self::UserKeywords => "user-keywords",
            Self::Directories => "directories",
            Self::Social => "social",
            Self::Imports => "imports",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A merged, scored discovery result; unique by host within one run
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSeed {
    pub source: SeedSource,
    /// Fragment-free URL; its normalized form becomes the task's dedupe key
    pub url: Url,
    pub seed_score: f64,
    pub tags: BTreeSet<String>,
}

/// One unit of fetch work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlTask {
    /// URL to fetch, fragment stripped
    pub url: Url,
    pub plan_tier: PlanTier,
    pub tags: BTreeSet<String>,
    /// Higher is fetched sooner
    pub priority: i64,
    pub not_before: Option<DateTime<Utc>>,
    /// Fetch timeout; zero means the worker default
    pub timeout_ms: u64,
    pub byte_budget: usize,
    /// Normalized URL unless overridden
    pub dedupe_key: String,
    /// Advisory region guessed from the TLD
    pub subject_region: Option<Region>,
    pub source: SeedSource,
    pub org_id: Option<String>,
}

impl CrawlTask {
    /// Builds a task for `url` with no priority and the worker's default budgets
    ///
    /// # Errors
    ///
    /// Returns `UrlError` for unparseable or non-HTTP(S) URLs.
    pub fn new(url: &str, plan_tier: PlanTier) -> Result<Self, UrlError> {
        let fetch_url = strip_fragment(url)?;
        let dedupe_key = normalize_url(url)?.to_string();

        Ok(Self {
            url: fetch_url,
            plan_tier,
            tags: BTreeSet::new(),
            priority: 0,
            not_before: None,
            timeout_ms: 0,
            byte_budget: usize::MAX,
            dedupe_key,
            subject_region: None,
            source: SeedSource::default(),
            org_id: None,
        })
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_budgets(mut self, timeout_ms: u64, byte_budget: usize) -> Self {
        self.timeout_ms = timeout_ms;
        self.byte_budget = byte_budget;
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_region(mut self, region: Option<Region>) -> Self {
        self.subject_region = region;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_source(mut self, source: SeedSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = key.into();
        self
    }
}

impl QueueItem for CrawlTask {
    fn dedupe_key(&self) -> &str {
        &self.dedupe_key
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }
}

/// Terminal status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Ok,
    Skipped,
    Error,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task did not produce a lead
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("fetch timed out after {timeout_ms} ms")]
    FetchTimeout { timeout_ms: u64 },

    #[error("fetch aborted: {0}")]
    FetchAborted(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("content rejected: {0}")]
    ContentRejected(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskFailure {
    pub fn status(&self) -> CrawlStatus {
        match self {
            Self::ContentRejected(_) | Self::PolicyDenied(_) => CrawlStatus::Skipped,
            _ => CrawlStatus::Error,
        }
    }
}

/// Response facts recorded for a fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMeta {
    pub status: u16,
    /// Body bytes read, never more than the task's byte budget
    pub bytes: u64,
    pub content_type: Option<String>,
}

/// A fetched page turned into a potential lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadCandidate {
    pub company_guess: Option<String>,
    /// Origin of the final URL, e.g. `https://acme.ca/`
    pub website: String,
    pub region: Option<Region>,
    pub signals: ExtractedSignals,
    pub tags: BTreeSet<String>,
}

/// Terminal outcome of one task, emitted exactly once
///
/// `status == Ok` exactly when a lead is present; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlResult {
    pub url: String,
    status: CrawlStatus,
    pub reason: Option<String>,
    pub http: Option<HttpMeta>,
    lead: Option<LeadCandidate>,
    pub raw_excerpt: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plan_tier: PlanTier,
    pub priority: i64,
    pub org_id: Option<String>,
}

impl CrawlResult {
    pub fn ok(
        task: &CrawlTask,
        http: HttpMeta,
        lead: LeadCandidate,
        raw_excerpt: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: task.url.to_string(),
            status: CrawlStatus::Ok,
            reason: None,
            http: Some(http),
            lead: Some(lead),
            raw_excerpt,
            started_at,
            finished_at: Utc::now(),
            plan_tier: task.plan_tier,
            priority: task.priority,
            org_id: task.org_id.clone(),
        }
    }

    pub fn failed(
        task: &CrawlTask,
        failure: &TaskFailure,
        http: Option<HttpMeta>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: task.url.to_string(),
            status: failure.status(),
            reason: Some(failure.to_string()),
            http,
            lead: None,
            raw_excerpt: None,
            started_at,
            finished_at: Utc::now(),
            plan_tier: task.plan_tier,
            priority: task.priority,
            org_id: task.org_id.clone(),
        }
    }

    pub fn status(&self) -> CrawlStatus {
        self.status
    }

    pub fn lead(&self) -> Option<&LeadCandidate> {
        self.lead.as_ref()
    }

    pub fn into_lead(self) -> Option<LeadCandidate> {
        self.lead
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// The feedback record for this outcome
    pub fn ingestion_event(&self) -> IngestionEvent {
        IngestionEvent {
            url: self.url.clone(),
            ok: self.status == CrawlStatus::Ok,
            status: self.http.as_ref().map(|h| h.status),
            bytes: self.http.as_ref().map(|h| h.bytes),
            reason: self.reason.clone(),
            timestamp: self.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> CrawlTask {
        CrawlTask::new("https://www.Acme.ca/products?utm_source=x#top", PlanTier::Free).unwrap()
    }

    #[test]
    fn test_new_task_keys() {
        let task = task();
        assert_eq!(task.url.fragment(), None);
        assert_eq!(task.dedupe_key, "https://acme.ca/products");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(CrawlTask::new("not a url", PlanTier::Free).is_err());
        assert!(CrawlTask::new("ftp://acme.ca/file", PlanTier::Free).is_err());
    }

    #[test]
    fn test_failure_status_mapping() {
        assert_eq!(
            TaskFailure::FetchTimeout { timeout_ms: 10 }.status(),
            CrawlStatus::Error
        );
        assert_eq!(TaskFailure::HttpStatus(500).status(), CrawlStatus::Error);
        assert_eq!(
            TaskFailure::ContentRejected("application/pdf".into()).status(),
            CrawlStatus::Skipped
        );
        assert_eq!(
            TaskFailure::PolicyDenied("robots.txt".into()).status(),
            CrawlStatus::Skipped
        );
    }

    #[test]
    fn test_failed_result_has_no_lead() {
        let result = CrawlResult::failed(
            &task(),
            &TaskFailure::HttpStatus(404),
            Some(HttpMeta {
                status: 404,
                bytes: 0,
                content_type: None,
            }),
            Utc::now(),
        );

        assert_eq!(result.status(), CrawlStatus::Error);
        assert!(result.lead().is_none());
        assert_eq!(result.reason.as_deref(), Some("HTTP status 404"));

        let event = result.ingestion_event();
        assert!(!event.ok);
        assert_eq!(event.status, Some(404));
    }

    #[test]
    fn test_ok_result_has_lead() {
        let lead = LeadCandidate {
            company_guess: Some("Acme".into()),
            website: "https://acme.ca/".into(),
            region: None,
            signals: ExtractedSignals::default(),
            tags: BTreeSet::new(),
        };
        let http = HttpMeta {
            status: 200,
            bytes: 1200,
            content_type: Some("text/html".into()),
        };
        let result = CrawlResult::ok(&task(), http, lead, None, Utc::now());

        assert_eq!(result.status(), CrawlStatus::Ok);
        assert!(result.lead().is_some());
        assert!(result.ingestion_event().ok);
    }
}
