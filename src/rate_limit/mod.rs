//! Token-bucket admission control and per-org daily quotas
//!
//! Buckets are keyed by plain strings built with [`BucketKey`]: one per plan
//! tier, organization, host or search provider. Every key resolves to a
//! [`BucketPolicy`] (rate and burst); keys without an explicit policy use the
//! limiter's default.

mod quota;

pub use quota::DailyQuota;

use crate::config::PlansConfig;
use crate::model::PlanTier;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Refill rate and capacity of one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketPolicy {
    /// Tokens added per second
    pub rate_per_sec: f64,
    /// Maximum number of stored tokens
    pub burst: f64,
}

impl BucketPolicy {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst: f64::from(burst.max(1)),
        }
    }

    /// Policy allowing `n` requests per minute with a burst of one
    pub fn per_minute(n: u32) -> Self {
        Self::new(f64::from(n.max(1)) / 60.0, 1)
    }
}

/// Helpers for building bucket keys
pub struct BucketKey;

impl BucketKey {
    pub fn plan(tier: PlanTier) -> String {
        format!("plan:{}", tier)
    }

    pub fn org(org_id: &str) -> String {
        format!("org:{}", org_id)
    }

    pub fn host(host: &str) -> String {
        format!("host:{}", host)
    }

    pub fn provider(provider_id: &str) -> String {
        format!("provider:{}", provider_id)
    }
}

/// A single token bucket
///
/// `tokens(now) = min(burst, tokens_prev + elapsed × rate)`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    policy: BucketPolicy,
    tokens: f64,
    updated_at: Instant,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(policy: BucketPolicy, now: Instant) -> Self {
        Self {
            policy,
            tokens: policy.burst,
            updated_at: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.policy.rate_per_sec).min(self.policy.burst);
        self.updated_at = self.updated_at.max(now);
    }

    /// Tokens available at `now`
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    /// Debits `cost` tokens and returns zero, or returns the wait in
    /// milliseconds until `cost` tokens will have accrued (nothing is debited)
    pub fn reserve(&mut self, cost: f64, now: Instant) -> u64 {
        self.refill(now);

        if self.tokens >= cost {
            self.tokens -= cost;
            return 0;
        }

        if self.policy.rate_per_sec <= 0.0 || cost > self.policy.burst {
            return u64::MAX;
        }

        let missing = cost - self.tokens;
        let wait_ms = (missing / self.policy.rate_per_sec * 1000.0).ceil();
        (wait_ms as u64).max(1)
    }
}

/// Keyed token-bucket rate limiter, safe for concurrent `reserve` calls
pub struct RateLimiter {
    default_policy: BucketPolicy,
    policies: Mutex<HashMap<String, BucketPolicy>>,
    buckets: Mutex<BucketMap>,
}

/// Key count that triggers the first sweep of idle buckets
const PRUNE_MIN: usize = 1024;

/// Buckets by key; a full bucket is indistinguishable from a fresh one, so
/// full buckets are dropped once the map grows past `prune_at`
struct BucketMap {
    by_key: HashMap<String, TokenBucket>,
    prune_at: usize,
}

impl BucketMap {
    fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            prune_at: PRUNE_MIN,
        }
    }

    fn prune(&mut self, now: Instant) {
        if self.by_key.len() < self.prune_at {
            return;
        }
        self.by_key
            .retain(|_, bucket| bucket.available(now) < bucket.policy.burst);
        self.prune_at = (self.by_key.len() * 2).max(PRUNE_MIN);
    }

    fn bucket(&mut self, key: &str, policy: BucketPolicy, now: Instant) -> &mut TokenBucket {
        self.prune(now);
        self.by_key
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(policy, now))
    }
}

impl RateLimiter {
    pub fn new(default_policy: BucketPolicy) -> Self {
        Self {
            default_policy,
            policies: Mutex::new(HashMap::new()),
            buckets: Mutex::new(BucketMap::new()),
        }
    }

    /// Builds a limiter with one bucket policy per plan tier
    pub fn from_plans(plans: &PlansConfig) -> Self {
        let free = plans.limits(PlanTier::Free);
        let limiter = Self::new(BucketPolicy::new(free.rate_per_sec, free.burst));
        for tier in PlanTier::ALL {
            let limits = plans.limits(tier);
            limiter.set_policy(
                BucketKey::plan(tier),
                BucketPolicy::new(limits.rate_per_sec, limits.burst),
            );
        }
        limiter
    }

    /// Sets (or replaces) the policy for one key
    ///
    /// An existing bucket for the key is dropped so the new policy applies
    /// from a full bucket.
    pub fn set_policy(&self, key: impl Into<String>, policy: BucketPolicy) {
        let key = key.into();
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .remove(&key);
        self.policies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, policy);
    }

    /// Sets a policy only if the key has none yet
    pub fn ensure_policy(&self, key: &str, policy: BucketPolicy) {
        let mut policies = self.policies.lock().unwrap_or_else(PoisonError::into_inner);
        policies.entry(key.to_string()).or_insert(policy);
    }

    fn policy_for(&self, key: &str) -> BucketPolicy {
        self.policies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Reserves `cost` tokens from the bucket for `key`
    ///
    /// Returns 0 when the tokens were debited and the caller may proceed now,
    /// otherwise the number of milliseconds until enough tokens will have
    /// accrued. Callers must not retry before that.
    pub fn reserve(&self, key: &str, cost: f64) -> u64 {
        self.reserve_at(key, cost, Instant::now())
    }

    /// [`RateLimiter::reserve`] against an explicit clock reading
    pub fn reserve_at(&self, key: &str, cost: f64, now: Instant) -> u64 {
        let policy = self.policy_for(key);
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.bucket(key, policy, now).reserve(cost, now)
    }

    /// Waits until `cost` tokens can be debited from `key`, then debits them
    pub async fn acquire(&self, key: &str, cost: f64) {
        loop {
            let wait_ms = self.reserve(key, cost);
            if wait_ms == 0 {
                return;
            }
            if wait_ms == u64::MAX {
                tracing::warn!(key, cost, "Reservation can never be satisfied, proceeding");
                return;
            }
            tracing::trace!(key, wait_ms, "Waiting for rate limit tokens");
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    /// Tokens currently available for `key`
    pub fn available(&self, key: &str) -> f64 {
        let policy = self.policy_for(key);
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.bucket(key, policy, now).available(now)
    }
}
