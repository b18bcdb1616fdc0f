//! Lead routing: score, tier and outreach plan for a crawled lead
//!
//! [`LeadRouter::route`] combines the extracted subscores with the user's
//! scoring weights and focus terms into a `0..=100` score, classifies the
//! lead as hot, warm or skip, and suggests channels and next actions.

mod channels;
mod synonyms;

pub use channels::{
    heuristic_channels, ChannelHints, ChannelRanker, CHANNEL_CONTACT_FORM, CHANNEL_EMAIL,
    CHANNEL_LINKEDIN, CHANNEL_PHONE, CHANNEL_PLATFORM_INBOX, CHANNEL_STOREFRONT, DEFAULT_CHANNELS,
};
pub use synonyms::SynonymTable;

use crate::crawler::{CrawlResult, LeadCandidate};
use crate::model::{PlanTier, UserIntent};
use crate::signals::{clamp_unit, ExtractedSignals};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Match fraction used when the user declared no focus terms
pub const NEUTRAL_MATCH: f64 = 0.5;

/// Product-market-fit boost band, scaled linearly by match fraction
const FIT_BOOST_MIN: f64 = 0.7;
const FIT_BOOST_MAX: f64 = 1.15;

const RFQ_BUMP: f64 = 0.05;
const CART_BUMP: f64 = 0.05;

/// Ops subscore at which a lead counts as operationally heavy
pub const HIGH_OPS: f64 = 0.55;

/// Next actions offered to free plans
const FREE_ACTION_LIMIT: usize = 1;
const PAID_ACTION_LIMIT: usize = 3;

/// Lead classification, ordered `Skip < Warm < Hot`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTier {
    Skip,
    Warm,
    Hot,
}

impl LeadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

impl fmt::Display for LeadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing outcome for one lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRouteDecision {
    pub tier: LeadTier,
    /// `0..=100`
    pub score: u8,
    /// `0..=1`
    pub match_fraction: f64,
    pub reasons: Vec<String>,
    /// Never empty
    pub preferred_channels: Vec<String>,
    pub next_actions: Vec<String>,
}

/// A lead together with its routing decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedLead {
    /// URL of the fetched page
    pub url: String,
    pub lead: LeadCandidate,
    pub decision: LeadRouteDecision,
}

/// Ordered tier rules; the first rule that holds wins
///
/// Raising `match_fraction` with everything else fixed never lowers the tier.
pub fn classify(score: u8, match_fraction: f64, strong_intent: bool, high_ops: bool) -> LeadTier {
    if score >= 80 && match_fraction >= 0.75 && strong_intent {
        LeadTier::Hot
    } else if score >= 65 && match_fraction >= 0.55 {
        LeadTier::Hot
    } else if score >= 55 && match_fraction >= 0.4 {
        LeadTier::Warm
    } else if score >= 50 && high_ops {
        LeadTier::Warm
    } else {
        LeadTier::Skip
    }
}

/// Scores and tiers leads against a user intent
#[derive(Clone, Default)]
pub struct LeadRouter {
    synonyms: SynonymTable,
    ranker: Option<Arc<dyn ChannelRanker>>,
}

impl fmt::Debug for LeadRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeadRouter")
            .field("synonyms", &self.synonyms)
            .field("ranker", &self.ranker.is_some())
            .finish()
    }
}

impl LeadRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = synonyms;
        self
    }

    /// Uses `ranker` for channel ordering instead of the heuristic
    pub fn with_ranker(mut self, ranker: Arc<dyn ChannelRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Share of the user's focus terms found on the lead, synonyms included
    pub fn match_fraction(&self, intent: &UserIntent, signals: &ExtractedSignals) -> f64 {
        self.synonyms
            .jaccard(&intent.focuses, &signals.packaging_keywords)
            .map_or(NEUTRAL_MATCH, clamp_unit)
    }

    /// Score in `0..=100` for a given match fraction
    pub fn score(&self, intent: &UserIntent, signals: &ExtractedSignals, match_fraction: f64) -> u8 {
        let weights = intent.weights.normalized();
        let subscores = signals.subscores.as_array();

        let base: f64 = weights
            .iter()
            .zip(subscores.iter())
            .map(|(w, s)| w * clamp_unit(*s))
            .sum();

        let boost = FIT_BOOST_MIN + (FIT_BOOST_MAX - FIT_BOOST_MIN) * clamp_unit(match_fraction);
        let mut raw = base * boost;
        if !signals.rfq_phrases.is_empty() {
            raw += RFQ_BUMP;
        }
        if signals.has_cart {
            raw += CART_BUMP;
        }

        (clamp_unit(raw) * 100.0).round() as u8
    }

    /// Routes one lead
    ///
    /// # Arguments
    ///
    /// * `lead` - Candidate built from a successful fetch
    /// * `intent` - Focus terms and scoring weights of the requesting user
    /// * `tier` - Plan of the requesting user; free plans get one next action
    pub fn route(&self, lead: &LeadCandidate, intent: &UserIntent, tier: PlanTier) -> LeadRouteDecision {
        let signals = &lead.signals;
        let match_fraction = self.match_fraction(intent, signals);
        let score = self.score(intent, signals, match_fraction);
        let strong_intent = signals.strong_intent();
        let high_ops = signals.subscores.ops >= HIGH_OPS;
        let lead_tier = classify(score, match_fraction, strong_intent, high_ops);

        let preferred_channels = self.channels(signals);
        let limit = if tier.is_paid() {
            PAID_ACTION_LIMIT
        } else {
            FREE_ACTION_LIMIT
        };
        let mut next_actions = next_actions(lead_tier, signals, &preferred_channels);
        next_actions.truncate(limit);

        tracing::debug!(
            website = %lead.website,
            score,
            match_fraction,
            tier = %lead_tier,
            "Routed lead"
        );

        LeadRouteDecision {
            tier: lead_tier,
            score,
            match_fraction,
            reasons: reasons(score, match_fraction, signals, high_ops),
            preferred_channels,
            next_actions,
        }
    }

    /// Routes every successful result, best score first
    ///
    /// Results without a lead are ignored. Ties keep input order.
    pub fn route_results(&self, results: &[CrawlResult], intent: &UserIntent) -> Vec<RoutedLead> {
        let mut routed: Vec<RoutedLead> = results
            .iter()
            .filter_map(|result| {
                let lead = result.lead()?;
                Some(RoutedLead {
                    url: result.url.clone(),
                    decision: self.route(lead, intent, result.plan_tier),
                    lead: lead.clone(),
                })
            })
            .collect();
        routed.sort_by(|a, b| b.decision.score.cmp(&a.decision.score));
        routed
    }

    fn channels(&self, signals: &ExtractedSignals) -> Vec<String> {
        let hints = ChannelHints::from_signals(signals);
        if let Some(ranker) = &self.ranker {
            let ranked = ranker.rank(&hints);
            if !ranked.is_empty() {
                return ranked;
            }
        }
        heuristic_channels(&hints)
    }
}

fn reasons(score: u8, match_fraction: f64, signals: &ExtractedSignals, high_ops: bool) -> Vec<String> {
    let mut reasons = vec![
        format!("score {}", score),
        format!("focus match {:.0}%", match_fraction * 100.0),
    ];

    if !signals.rfq_phrases.is_empty() {
        reasons.push(format!("procurement language: {}", signals.rfq_phrases.join(", ")));
    }
    if signals.has_cart {
        reasons.push("active shopping cart".to_string());
    }
    if !signals.platforms.is_empty() {
        reasons.push(format!("storefront on {}", signals.platforms.join(", ")));
    }
    if high_ops {
        reasons.push("heavy warehouse/fulfillment footprint".to_string());
    }
    if signals.hiring {
        reasons.push("currently hiring".to_string());
    }
    if !signals.competitor_mentions.is_empty() {
        reasons.push(format!("mentions {}", signals.competitor_mentions.join(", ")));
    }
    if !signals.urgency_phrases.is_empty() {
        reasons.push("urgency language on page".to_string());
    }
    reasons
}

fn next_actions(tier: LeadTier, signals: &ExtractedSignals, channels: &[String]) -> Vec<String> {
    let channel = channels
        .first()
        .map(|c| c.replace('_', " "))
        .unwrap_or_else(|| "email".to_string());

    let mut actions = Vec::new();
    match tier {
        LeadTier::Hot => {
            if !signals.rfq_phrases.is_empty() {
                actions.push(format!("Send a quote via {} today; they are asking for one", channel));
            } else {
                actions.push(format!("Reach out via {} within 24 hours", channel));
            }
        }
        LeadTier::Warm => {
            actions.push(format!("Add to a nurture sequence and open via {}", channel));
        }
        LeadTier::Skip => {
            actions.push("Revisit in 30 days; fit is weak today".to_string());
            return actions;
        }
    }

    if let Some(platform) = signals.review_platforms.first() {
        actions.push(format!("Reference their {} reviews to open on customer experience", platform));
    }
    if signals.hiring {
        actions.push("Mention their hiring push: growing teams ship more".to_string());
    }
    if let Some(brand) = signals.competitor_mentions.first() {
        actions.push(format!("Position against {} on price and lead time", brand));
    }
    actions
}
