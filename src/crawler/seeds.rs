//! Seed merge, filtering and seed → task conversion

use crate::config::PlanLimits;
use crate::crawler::queries::{TAG_COMPETITOR, TAG_KEYWORD, TAG_RFQ};
use crate::crawler::task::{CrawlTask, LeadSeed, SeedSource};
use crate::model::PlanTier;
use crate::providers::{DiscoverySource, SearchQuery, SearchResult};
use crate::signals::clamp_unit;
use crate::url::{guess_region, host_key, is_pdf, is_social_profile, matches_denylist, strip_fragment};
use crate::UrlError;
use std::collections::{BTreeSet, HashSet};

/// Tags that mark a result as showing buying intent
const INTENT_TAGS: [&str; 3] = [TAG_RFQ, "buyer-intent", "hiring"];

/// Seed-score bump for results carrying an intent tag
const INTENT_TAG_BONUS: f64 = 0.1;

/// Priority bump for seeds found through RFQ phrasing
const RFQ_PRIORITY_BONUS: i64 = 10;

/// Priority bump for competitor look-alikes
const COMPETITOR_PRIORITY_BONUS: i64 = 5;

/// Results of one provider call, in query order
#[derive(Debug, Clone)]
pub struct QueryHits {
    pub query: SearchQuery,
    pub results: Vec<SearchResult>,
}

/// Hosts a seed must never point at
#[derive(Debug, Clone, Default)]
pub struct SeedFilter {
    pub denylist: Vec<String>,
    /// Host key of the caller's own website
    pub own_host: Option<String>,
}

impl SeedFilter {
    /// Reason `host` is excluded, if it is
    fn rejects(&self, host: &str) -> Option<&'static str> {
        if is_social_profile(host) {
            Some("social profile")
        } else if self.own_host.as_deref() == Some(host) {
            Some("own website")
        } else if self.denylist.iter().any(|entry| matches_denylist(entry, host)) {
            Some("denylisted")
        } else {
            None
        }
    }
}

/// Merges provider hits into at most `max_seeds` scored seeds
///
/// Results are deduped by host key with the first occurrence winning, so
/// `hits` must already be in query order. Social profiles, PDFs, the
/// caller's own site and denylisted hosts are dropped, as are malformed
/// URLs. Seeds come back sorted by descending score, ties in merge order.
pub fn merge_seeds(hits: &[QueryHits], filter: &SeedFilter, max_seeds: usize) -> Vec<LeadSeed> {
    let mut seen_hosts = HashSet::new();
    let mut seeds = Vec::new();

    for hit in hits {
        for result in &hit.results {
            let url = match strip_fragment(&result.url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(url = %result.url, error = %e, "Dropping malformed result URL");
                    continue;
                }
            };
            let Some(host) = url.host_str().map(host_key) else {
                continue;
            };

            if seen_hosts.contains(&host) {
                continue;
            }
            if let Some(reason) = filter.rejects(&host) {
                tracing::trace!(url = %url, reason, "Dropping result");
                continue;
            }
            if is_pdf(&url) {
                tracing::trace!(url = %url, "Dropping PDF result");
                continue;
            }
            seen_hosts.insert(host);

            let tags: BTreeSet<String> = result
                .tags
                .iter()
                .chain(hit.query.tags.iter())
                .cloned()
                .collect();
            let bonus = if INTENT_TAGS.iter().any(|tag| tags.contains(*tag)) {
                INTENT_TAG_BONUS
            } else {
                0.0
            };

            seeds.push(LeadSeed {
                source: seed_source(result.source, &hit.query),
                url,
                seed_score: clamp_unit(result.relevance + bonus),
                tags,
            });
        }
    }

    seeds.sort_by(|a, b| b.seed_score.total_cmp(&a.seed_score));
    seeds.truncate(max_seeds);
    seeds
}

fn seed_source(source: DiscoverySource, query: &SearchQuery) -> SeedSource {
    match source {
        DiscoverySource::Directory => SeedSource::Directories,
        DiscoverySource::Import => SeedSource::Imports,
        DiscoverySource::WebSearch | DiscoverySource::News => {
            if query.has_tag(TAG_KEYWORD) {
                SeedSource::UserKeywords
            } else if query.has_tag(TAG_COMPETITOR) {
                SeedSource::UserWebsite
            } else {
                SeedSource::Search
            }
        }
    }
}

/// Turns a seed into a crawl task with plan budgets and a region guess
///
/// `priority = round(score × 100)` plus tag bonuses.
pub fn seed_to_task(seed: &LeadSeed, tier: PlanTier, limits: &PlanLimits) -> Result<CrawlTask, UrlError> {
    let mut priority = (seed.seed_score * 100.0).round() as i64;
    if seed.tags.contains(TAG_RFQ) {
        priority += RFQ_PRIORITY_BONUS;
    }
    if seed.tags.contains(TAG_COMPETITOR) {
        priority += COMPETITOR_PRIORITY_BONUS;
    }

    let region = seed.url.host_str().and_then(guess_region);

    Ok(CrawlTask::new(seed.url.as_str(), tier)?
        .with_priority(priority)
        .with_budgets(limits.timeout_ms, limits.byte_budget)
        .with_region(region)
        .with_tags(seed.tags.iter().cloned())
        .with_source(seed.source))
}
