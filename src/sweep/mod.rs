//! Periodic org sweep
//!
//! Each tick walks the active organizations and, per org, decides how much
//! discovery and refresh work to enqueue: quiet hours, queue backpressure,
//! the daily cap and the org's rate-limit bucket can each hold an org back
//! for the tick. What is left is paced so that an org's daily target is
//! spread evenly over the UTC day.

mod envelope;
mod org;

pub use envelope::{TaskEnvelope, TaskKind, TaskSink};
pub use org::{OrgMeta, OrgProfile, OrgStore, QuietHours};

use crate::config::{PlansConfig, SweepConfig};
use crate::rate_limit::{BucketKey, BucketPolicy, DailyQuota, RateLimiter};
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;

/// Why an org got no work this tick, or what it got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Free org inside its quiet window
    QuietHours,
    Backpressure { backlog: usize, limit: usize },
    DailyCapReached,
    RateLimited { wait_ms: u64 },
    Enqueued { discovery: u32, refresh: u32 },
}

/// Sweep decision for one org
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgDecision {
    pub org_id: String,
    pub outcome: SweepOutcome,
}

/// Result of one sweep tick
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub decisions: Vec<OrgDecision>,
}

impl SweepReport {
    /// Envelopes accepted by the sink this tick
    pub fn enqueued(&self) -> u32 {
        self.decisions
            .iter()
            .map(|d| match d.outcome {
                SweepOutcome::Enqueued { discovery, refresh } => discovery + refresh,
                _ => 0,
            })
            .sum()
    }
}

/// Periodic control loop that feeds org work into a [`TaskSink`]
pub struct OrgSweepScheduler {
    config: SweepConfig,
    plans: PlansConfig,
    store: Arc<dyn OrgStore>,
    sink: Arc<dyn TaskSink>,
    limiter: Arc<RateLimiter>,
    /// Envelopes of every kind per org and UTC day
    enqueued_today: DailyQuota,
    /// Refresh envelopes per org and UTC day
    refreshed_today: DailyQuota,
}

impl OrgSweepScheduler {
    pub fn new(
        config: SweepConfig,
        plans: PlansConfig,
        store: Arc<dyn OrgStore>,
        sink: Arc<dyn TaskSink>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_plans(&plans));
        Self {
            config,
            plans,
            store,
            sink,
            limiter,
            enqueued_today: DailyQuota::new(),
            refreshed_today: DailyQuota::new(),
        }
    }

    /// Shares a rate limiter with other components
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Runs sweeps every `interval ± jitter` until `shutdown` resolves
    ///
    /// The next tick is scheduled only after the previous sweep finished, so
    /// two sweeps never overlap.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            match self.sweep_once(Utc::now()).await {
                Ok(report) => {
                    tracing::info!(
                        orgs = report.decisions.len(),
                        enqueued = report.enqueued(),
                        "Sweep finished"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "Sweep failed"),
            }

            let delay = self.next_delay();
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Sweep loop stopped");
    }

    fn next_delay(&self) -> std::time::Duration {
        let interval = self.config.interval_secs as f64;
        let jitter = self.config.jitter.clamp(0.0, 0.99);
        let factor = if jitter > 0.0 {
            1.0 + rand::rng().random_range(-jitter..=jitter)
        } else {
            1.0
        };
        std::time::Duration::from_secs_f64((interval * factor).max(1.0))
    }

    /// One tick over every active org
    ///
    /// With an unchanged clock, queue and org list the decisions are the
    /// same; dedupe keys absorb any envelope enqueued twice.
    ///
    /// # Errors
    ///
    /// Fails only if the org list cannot be loaded.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> anyhow::Result<SweepReport> {
        let orgs = self.store.list_active_orgs().await?;
        let mut report = SweepReport::default();

        for org in orgs.iter().filter(|o| o.active) {
            let outcome = self.sweep_org(org, now).await;
            match &outcome {
                SweepOutcome::Enqueued { discovery, refresh } => {
                    tracing::debug!(org_id = %org.id, discovery, refresh, "Org work enqueued");
                }
                skipped => tracing::debug!(org_id = %org.id, outcome = ?skipped, "Org skipped this tick"),
            }
            report.decisions.push(OrgDecision {
                org_id: org.id.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    async fn sweep_org(&self, org: &OrgProfile, now: DateTime<Utc>) -> SweepOutcome {
        let quiet = org.is_quiet(now);
        if quiet && !org.plan_tier.is_paid() {
            return SweepOutcome::QuietHours;
        }

        let limits = self.plans.limits(org.plan_tier);
        let cap = org
            .concurrency_cap
            .unwrap_or(limits.max_parallel_searches as u32)
            .max(1) as usize;
        let backlog = self.sink.size(Some(&org.id)).await.unwrap_or(0);
        let limit = self.config.backlog_multiplier as usize * cap;
        if backlog > limit {
            return SweepOutcome::Backpressure { backlog, limit };
        }

        if self.enqueued_today.is_exhausted(&org.id, org.daily_cap, now) {
            return SweepOutcome::DailyCapReached;
        }

        let bucket = BucketKey::org(&org.id);
        self.limiter.ensure_policy(
            &bucket,
            BucketPolicy::new(limits.rate_per_sec, limits.burst),
        );
        let wait_ms = self.limiter.reserve(&bucket, 1.0);
        if wait_ms > 0 {
            return SweepOutcome::RateLimited { wait_ms };
        }

        let used = self.enqueued_today.used(&org.id, now);
        let refreshed = self.refreshed_today.used(&org.id, now);
        let discovered = used.saturating_sub(refreshed);
        let queued_estimate = backlog as f64 * self.config.queued_estimate_factor;
        let mut remaining = self.enqueued_today.remaining(&org.id, org.daily_cap, now);

        let discovery_wanted = if quiet {
            0
        } else {
            paced_count(
                org.daily_discovery_target,
                now,
                discovered,
                queued_estimate,
                self.config.max_discovery_per_tick,
            )
            .min(remaining)
        };
        remaining -= discovery_wanted;

        let refresh_wanted = paced_count(
            org.daily_refresh_target,
            now,
            refreshed,
            queued_estimate,
            self.config.max_refresh_per_tick,
        )
        .min(remaining);

        let day = now.format("%Y-%m-%d").to_string();
        let discovery = self
            .enqueue_kind(org, TaskKind::Discover, discovery_wanted, discovered, &day, now)
            .await;
        let refresh = self
            .enqueue_kind(org, TaskKind::Refresh, refresh_wanted, refreshed, &day, now)
            .await;

        self.enqueued_today.record(&org.id, discovery + refresh, now);
        self.refreshed_today.record(&org.id, refresh, now);

        if discovery + refresh > 0 {
            let meta = OrgMeta {
                last_discovery: (discovery > 0).then_some(now),
                last_refresh: (refresh > 0).then_some(now),
            };
            if let Err(e) = self.store.set_org_meta(&org.id, meta).await {
                tracing::debug!(org_id = %org.id, error = %e, "Failed to persist org metadata");
            }
        }

        SweepOutcome::Enqueued { discovery, refresh }
    }

    /// Pushes `count` envelopes of `kind`, numbered after `already` today
    async fn enqueue_kind(
        &self,
        org: &OrgProfile,
        kind: TaskKind,
        count: u32,
        already: u32,
        day: &str,
        now: DateTime<Utc>,
    ) -> u32 {
        let priority = match kind {
            TaskKind::Refresh => self.config.refresh_priority,
            _ => self.config.discovery_priority,
        };

        let mut accepted = 0;
        for slot in already..already.saturating_add(count) {
            let key = format!("{}:{}:{}:{}", kind, org.id, day, slot);
            let delay = stagger_secs(&key, self.config.stagger_max_secs);
            let payload = match kind {
                TaskKind::Refresh => serde_json::json!({ "since": org.last_refresh }),
                _ => serde_json::json!({ "intent": org.intent }),
            };

            let envelope = TaskEnvelope::new(kind, org.id.clone(), org.plan_tier)
                .with_priority(priority)
                .with_not_before(now + Duration::seconds(delay as i64))
                .with_payload(payload)
                .with_dedupe_key(key);

            if self.sink.push(envelope).await {
                accepted += 1;
            }
        }
        accepted
    }
}

/// Work still owed today: `target × minutes_elapsed / 1440` minus work done
/// and an estimate of queued work, clamped to `0..=per_tick`
fn paced_count(target: u32, now: DateTime<Utc>, done: u32, queued_estimate: f64, per_tick: u32) -> u32 {
    let minutes = f64::from(now.hour() * 60 + now.minute());
    let expected = f64::from(target) * minutes / 1440.0;
    let owed = expected - f64::from(done) - queued_estimate;
    if owed.is_nan() || owed <= 0.0 {
        return 0;
    }
    (owed.floor() as u32).min(per_tick)
}

/// Deterministic `not_before` offset in `0..=max_secs` derived from `key`
fn stagger_secs(key: &str, max_secs: u64) -> u64 {
    if max_secs == 0 {
        return 0;
    }
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % (max_secs + 1)
}
