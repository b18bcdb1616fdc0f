use crate::model::{PlanTier, UserIntent};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Local-time window in which heavy work is held back
///
/// `start_hour..end_hour`, wrapping through midnight when `start > end`.
/// Equal hours mean no quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (u32::from(self.start_hour), u32::from(self.end_hour));
        if start == end {
            false
        } else if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

/// Everything the sweep loop needs to know about one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgProfile {
    pub id: String,
    pub plan_tier: PlanTier,
    pub active: bool,
    /// Offset of the org's local time from UTC
    pub utc_offset_minutes: i32,
    pub quiet_hours: Option<QuietHours>,
    /// Parallel work the org may have in flight; the plan's search fan-out
    /// when unset
    pub concurrency_cap: Option<u32>,
    /// Discovery envelopes to spread over one UTC day
    pub daily_discovery_target: u32,
    /// Refresh envelopes to spread over one UTC day
    pub daily_refresh_target: u32,
    /// Hard ceiling on envelopes per UTC day
    pub daily_cap: u32,
    pub intent: UserIntent,
    pub last_discovery: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Default for OrgProfile {
    fn default() -> Self {
        Self {
            id: String::new(),
            plan_tier: PlanTier::Free,
            active: true,
            utc_offset_minutes: 0,
            quiet_hours: None,
            concurrency_cap: None,
            daily_discovery_target: 40,
            daily_refresh_target: 20,
            daily_cap: 100,
            intent: UserIntent::default(),
            last_discovery: None,
            last_refresh: None,
        }
    }
}

impl OrgProfile {
    pub fn new(id: impl Into<String>, plan_tier: PlanTier) -> Self {
        Self {
            id: id.into(),
            plan_tier,
            ..Self::default()
        }
    }

    /// Hour of day in the org's local time
    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        (now + Duration::minutes(i64::from(self.utc_offset_minutes))).hour()
    }

    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        self.quiet_hours
            .map_or(false, |quiet| quiet.contains(self.local_hour(now)))
    }
}

/// Partial org update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgMeta {
    pub last_discovery: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Source of organization profiles
#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn list_active_orgs(&self) -> anyhow::Result<Vec<OrgProfile>>;

    async fn get_org(&self, id: &str) -> anyhow::Result<Option<OrgProfile>>;

    /// Best-effort metadata write; stores without one accept and ignore it
    async fn set_org_meta(&self, _id: &str, _meta: OrgMeta) -> anyhow::Result<()> {
        Ok(())
    }
}
