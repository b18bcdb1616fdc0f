//! Discovery query construction

use crate::config::DiscoveryConfig;
use crate::model::UserIntent;
use crate::providers::SearchQuery;
use crate::url::host_key;
use std::collections::HashSet;
use url::Url;

/// Query built from a focus term and an intent phrase
pub const TAG_FOCUS: &str = "focus";
/// Query built from a storefront platform hint
pub const TAG_PLATFORM: &str = "platform";
/// Query aimed at warehouses and fulfillment operations
pub const TAG_OPS: &str = "ops";
/// Query taken verbatim from the user's extra keywords
pub const TAG_KEYWORD: &str = "keyword";
/// Query mining look-alikes of the user's own website
pub const TAG_COMPETITOR: &str = "competitor";
/// The intent phrase asks for quotes
pub const TAG_RFQ: &str = "rfq";

/// Focus used when the intent names none
const DEFAULT_FOCUS: &str = "packaging";

const RFQ_MARKERS: [&str; 4] = ["quote", "rfq", "rfp", "tender"];

/// Builds the deduplicated, capped query list for one discovery run
///
/// Order: region × focus × intent phrase, then platform hints, operational
/// surfaces, extra keywords and finally competitor mining. Queries are
/// deduped by `(text, region)`, first occurrence wins, and the list is cut
/// at `max_queries`.
pub fn build_queries(intent: &UserIntent, discovery: &DiscoveryConfig) -> Vec<SearchQuery> {
    let regions: Vec<Option<String>> = if intent.geo.is_empty() {
        vec![None]
    } else {
        intent.geo.iter().map(|geo| Some(geo.label())).collect()
    };

    let focuses = non_empty(&intent.focuses, &[]);
    let focuses = if focuses.is_empty() {
        vec![DEFAULT_FOCUS.to_string()]
    } else {
        focuses
    };
    let phrases = non_empty(&intent.intent_phrases, &discovery.intent_phrases);
    let platforms = non_empty(&intent.platform_hints, &discovery.platform_hints);
    let surfaces = non_empty(&discovery.ops_surfaces, &[]);
    let keywords = non_empty(&intent.extra_keywords, &[]);

    let mut queries = Vec::new();

    for region in &regions {
        for focus in &focuses {
            for phrase in &phrases {
                let mut query =
                    SearchQuery::new(format!("{} {}", focus, phrase), region.clone()).with_tag(TAG_FOCUS);
                if is_rfq_phrase(phrase) {
                    query = query.with_tag(TAG_RFQ);
                }
                queries.push(query);
            }
        }
    }

    for region in &regions {
        for focus in &focuses {
            for platform in &platforms {
                queries.push(
                    SearchQuery::new(format!("{} {} store", focus, platform), region.clone())
                        .with_tag(TAG_PLATFORM),
                );
            }
        }
    }

    for region in &regions {
        for surface in &surfaces {
            for focus in &focuses {
                queries.push(
                    SearchQuery::new(format!("{} {}", surface, focus), region.clone()).with_tag(TAG_OPS),
                );
            }
        }
    }

    for region in &regions {
        for keyword in &keywords {
            queries.push(SearchQuery::new(keyword.clone(), region.clone()).with_tag(TAG_KEYWORD));
        }
    }

    if let Some(host) = intent.website.as_deref().and_then(website_host) {
        queries.push(SearchQuery::new(format!("related:{}", host), None).with_tag(TAG_COMPETITOR));
        for focus in &focuses {
            queries.push(
                SearchQuery::new(format!("intitle:\"{}\" -site:{}", focus, host), None)
                    .with_tag(TAG_COMPETITOR),
            );
        }
    }

    let mut seen = HashSet::new();
    queries.retain(|query| seen.insert(query.dedupe_key()));
    queries.truncate(discovery.max_queries);
    queries
}

/// Host key of the user's own website; bare hosts are accepted
pub(crate) fn website_host(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }

    let parsed = Url::parse(website).or_else(|_| Url::parse(&format!("https://{}", website)));
    match parsed {
        Ok(url) => url.host_str().map(host_key),
        Err(e) => {
            tracing::debug!(website, error = %e, "Ignoring unparseable website");
            None
        }
    }
}

fn is_rfq_phrase(phrase: &str) -> bool {
    let lower = phrase.to_lowercase();
    RFQ_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Trimmed, non-empty entries of `primary`, or of `fallback` when none remain
fn non_empty(primary: &[String], fallback: &[String]) -> Vec<String> {
    let clean = |items: &[String]| -> Vec<String> {
        items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let picked = clean(primary);
    if picked.is_empty() {
        clean(fallback)
    } else {
        picked
    }
}
