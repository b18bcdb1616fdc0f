use crate::model::PlanTier;
use crate::queue::{QueueItem, SharedTaskQueue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a sweep envelope asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Discover,
    Crawl,
    Enrich,
    Refresh,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Crawl => "crawl",
            Self::Enrich => "enrich",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of org-scoped work produced by the sweep loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub kind: TaskKind,
    pub org_id: String,
    pub plan_tier: PlanTier,
    /// `1..=10`, higher is sooner
    pub priority: u8,
    /// Defaults to `{kind}:{org_id}`
    pub dedupe_key: String,
    pub not_before: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(kind: TaskKind, org_id: impl Into<String>, plan_tier: PlanTier) -> Self {
        let org_id = org_id.into();
        Self {
            dedupe_key: format!("{}:{}", kind, org_id),
            kind,
            org_id,
            plan_tier,
            priority: 5,
            not_before: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Sets the priority, clamped to `1..=10`
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = key.into();
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl QueueItem for TaskEnvelope {
    fn dedupe_key(&self) -> &str {
        &self.dedupe_key
    }

    fn priority(&self) -> i64 {
        i64::from(self.priority)
    }

    fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    fn org_id(&self) -> Option<&str> {
        Some(&self.org_id)
    }
}

/// Destination for sweep envelopes
///
/// `push` must drop envelopes whose dedupe key is already queued and must
/// never release one before its `not_before`.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Returns false if the envelope was dropped as a duplicate
    async fn push(&self, envelope: TaskEnvelope) -> bool;

    /// Queued envelopes for `org_id` (or all), if the sink can tell
    async fn size(&self, _org_id: Option<&str>) -> Option<usize> {
        None
    }
}

#[async_trait]
impl TaskSink for SharedTaskQueue<TaskEnvelope> {
    async fn push(&self, envelope: TaskEnvelope) -> bool {
        SharedTaskQueue::push(self, envelope)
    }

    async fn size(&self, org_id: Option<&str>) -> Option<usize> {
        Some(SharedTaskQueue::size(self, org_id))
    }
}
