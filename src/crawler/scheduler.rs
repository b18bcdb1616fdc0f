//! Discovery scheduler - queries, provider fan-out and seeding
//!
//! This module handles:
//! - Building discovery queries from a user intent
//! - Fanning queries out over the allowed search providers with a bounded
//!   number of concurrent searchers
//! - Pacing provider calls (random delay, optional per-provider rate limit)
//! - Merging results into seeds and seeds into prioritized crawl tasks

use crate::config::{Config, DiscoveryConfig, PlansConfig};
use crate::crawler::queries::{build_queries, website_host};
use crate::crawler::seeds::{merge_seeds, seed_to_task, QueryHits, SeedFilter};
use crate::crawler::task::CrawlTask;
use crate::crawler::worker::CrawlWorker;
use crate::model::{PlanTier, UserIntent};
use crate::providers::{SearchProvider, SearchQuery};
use crate::rate_limit::{BucketKey, BucketPolicy, RateLimiter};
use futures::future::join_all;
use futures::FutureExt;
use rand::Rng;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// What one discovery run did
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub queries: usize,
    pub provider_calls: usize,
    pub provider_failures: usize,
    pub results: usize,
    pub seeds: usize,
    /// Tasks accepted by the worker, in scheduling order
    pub scheduled: Vec<CrawlTask>,
}

/// Builds queries, searches and hands the resulting tasks to a worker
pub struct CrawlScheduler {
    discovery: DiscoveryConfig,
    plans: PlansConfig,
    providers: Vec<Arc<dyn SearchProvider>>,
    limiter: Arc<RateLimiter>,
    worker: Arc<CrawlWorker>,
}

/// One provider answer, keyed for deterministic merge order
struct ProviderAnswer {
    query_index: usize,
    provider_index: usize,
    hits: QueryHits,
}

#[derive(Default)]
struct Tally {
    calls: usize,
    failures: usize,
}

impl CrawlScheduler {
    pub fn new(
        discovery: DiscoveryConfig,
        plans: PlansConfig,
        providers: Vec<Arc<dyn SearchProvider>>,
        worker: Arc<CrawlWorker>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_plans(&plans));
        Self {
            discovery,
            plans,
            providers,
            limiter,
            worker,
        }
    }

    pub fn from_config(
        config: &Config,
        providers: Vec<Arc<dyn SearchProvider>>,
        worker: Arc<CrawlWorker>,
    ) -> Self {
        Self::new(config.discovery.clone(), config.plans.clone(), providers, worker)
    }

    /// Shares a rate limiter with other components
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn worker(&self) -> &Arc<CrawlWorker> {
        &self.worker
    }

    /// The queries a discovery run for `intent` would issue
    pub fn plan_queries(&self, intent: &UserIntent) -> Vec<SearchQuery> {
        build_queries(intent, &self.discovery)
    }

    /// Runs discovery for `intent` and schedules the resulting tasks
    ///
    /// Provider failures are logged and skipped; malformed URLs are dropped.
    /// The worker is started if it is not running yet, even when nothing was
    /// scheduled.
    pub async fn discover_and_schedule(&self, intent: &UserIntent, tier: PlanTier) -> DiscoveryReport {
        let limits = self.plans.limits(tier);
        let queries = self.plan_queries(intent);

        let providers: Vec<Arc<dyn SearchProvider>> = self
            .providers
            .iter()
            .filter(|p| tier.is_paid() || p.is_free_tier_eligible())
            .cloned()
            .collect();

        let mut report = DiscoveryReport {
            queries: queries.len(),
            ..DiscoveryReport::default()
        };

        if providers.is_empty() {
            tracing::warn!(plan = %tier, "No search providers available for plan");
        }

        let hits = if providers.is_empty() || queries.is_empty() {
            Vec::new()
        } else {
            let searchers = limits.max_parallel_searches.clamp(1, queries.len());
            tracing::info!(
                plan = %tier,
                queries = queries.len(),
                providers = providers.len(),
                searchers,
                "Starting discovery"
            );

            let pending = Mutex::new(queries.into_iter().enumerate().collect::<VecDeque<_>>());
            let tally = Mutex::new(Tally::default());

            let answers = join_all(
                (0..searchers).map(|searcher| self.run_searcher(searcher, &pending, &providers, &tally)),
            )
            .await;

            let tally = tally.into_inner().unwrap_or_else(PoisonError::into_inner);
            report.provider_calls = tally.calls;
            report.provider_failures = tally.failures;

            let mut answers: Vec<ProviderAnswer> = answers.into_iter().flatten().collect();
            answers.sort_by_key(|a| (a.query_index, a.provider_index));
            answers.into_iter().map(|a| a.hits).collect::<Vec<_>>()
        };

        report.results = hits.iter().map(|h| h.results.len()).sum();

        let filter = SeedFilter {
            denylist: self.discovery.denylist.clone(),
            own_host: intent.website.as_deref().and_then(website_host),
        };
        let seeds = merge_seeds(&hits, &filter, limits.max_seed_urls);
        report.seeds = seeds.len();

        for seed in &seeds {
            let task = match seed_to_task(seed, tier, limits) {
                Ok(task) => task,
                Err(e) => {
                    tracing::debug!(url = %seed.url, error = %e, "Dropping seed");
                    continue;
                }
            };
            let task = match &intent.org_id {
                Some(org_id) => task.with_org(org_id.clone()),
                None => task,
            };

            if self.worker.enqueue(task.clone()) {
                report.scheduled.push(task);
            }
        }

        tracing::info!(
            plan = %tier,
            calls = report.provider_calls,
            failures = report.provider_failures,
            seeds = report.seeds,
            scheduled = report.scheduled.len(),
            "Discovery finished"
        );

        if let Err(e) = self.worker.start() {
            tracing::debug!(error = %e, "Crawl worker not started");
        }

        report
    }

    /// One bounded searcher: pulls queries until the shared queue is empty
    async fn run_searcher(
        &self,
        searcher: usize,
        pending: &Mutex<VecDeque<(usize, SearchQuery)>>,
        providers: &[Arc<dyn SearchProvider>],
        tally: &Mutex<Tally>,
    ) -> Vec<ProviderAnswer> {
        let mut answers = Vec::new();
        let mut cursor = searcher;

        loop {
            let next = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some((query_index, query)) = next else {
                break;
            };

            let provider_index = cursor % providers.len();
            cursor += 1;
            let provider = &providers[provider_index];

            if let Some(per_minute) = provider.max_per_minute() {
                let key = BucketKey::provider(provider.id());
                self.limiter.ensure_policy(&key, BucketPolicy::per_minute(per_minute));
                self.limiter.acquire(&key, 1.0).await;
            }

            let outcome = AssertUnwindSafe(provider.search(&query)).catch_unwind().await;
            {
                let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
                tally.calls += 1;
                if !matches!(outcome, Ok(Ok(_))) {
                    tally.failures += 1;
                }
            }

            match outcome {
                Ok(Ok(results)) => {
                    tracing::debug!(
                        provider = provider.id(),
                        query = %query.text,
                        results = results.len(),
                        "Search finished"
                    );
                    answers.push(ProviderAnswer {
                        query_index,
                        provider_index,
                        hits: QueryHits { query, results },
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider = provider.id(), query = %query.text, error = %e, "Search provider failed");
                }
                Err(_) => {
                    tracing::warn!(provider = provider.id(), query = %query.text, "Search provider panicked");
                }
            }

            let pause = self.pacing_delay();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        answers
    }

    fn pacing_delay(&self) -> Duration {
        let min = self.discovery.pacing_min_ms;
        let max = self.discovery.pacing_max_ms;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}
