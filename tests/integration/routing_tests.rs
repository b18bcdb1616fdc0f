//! Integration tests for signal extraction and lead routing

use crate::HOT_PAGE;
use lead_crawler::crawler::LeadCandidate;
use lead_crawler::router::classify;
use lead_crawler::{extract, ExtractedSignals, LeadRouter, LeadTier, PlanTier, ScoringWeights, UserIntent};
use std::collections::BTreeSet;
use url::Url;

fn candidate(signals: ExtractedSignals) -> LeadCandidate {
    LeadCandidate {
        company_guess: None,
        website: "https://acmesupply.ca/".to_string(),
        region: None,
        signals,
        tags: BTreeSet::new(),
    }
}

fn stretch_wrap_intent() -> UserIntent {
    UserIntent {
        focuses: vec!["stretch wrap".to_string()],
        weights: ScoringWeights {
            demand: 1.0,
            procurement: 0.0,
            ops: 0.0,
            reputation: 0.0,
            urgency: 0.0,
        },
        ..UserIntent::default()
    }
}

#[test]
fn test_buyer_page_routes_hot() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    let signals = extract(HOT_PAGE, &url);

    // Synonyms all fold into the one focus term
    for term in ["stretch wrap", "stretch film", "pallet wrap", "pallet film"] {
        assert!(signals.packaging_keywords.iter().any(|k| k == term), "missing {}", term);
    }
    assert!(signals.rfq_phrases.iter().any(|p| p == "request a quote"));
    assert!(signals.competitor_mentions.iter().any(|c| c == "uline"));
    assert!(signals.strong_intent());

    let decision = LeadRouter::new().route(&candidate(signals), &stretch_wrap_intent(), PlanTier::Pro);

    assert_eq!(decision.match_fraction, 1.0);
    assert!(decision.score >= 80);
    assert_eq!(decision.tier, LeadTier::Hot);
    assert!(!decision.preferred_channels.is_empty());
    assert!(!decision.reasons.is_empty());
    assert!(decision.next_actions.len() <= 3);
}

#[test]
fn test_rfq_with_cart_routes_hot() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    let signals = extract(
        "<p>We need stretch wrap. Send your RFQ.</p><button>Add to cart</button>",
        &url,
    );
    assert_eq!(signals.rfq_phrases, vec!["rfq".to_string()]);
    assert!(signals.has_cart);

    let decision = LeadRouter::new().route(&candidate(signals), &stretch_wrap_intent(), PlanTier::Pro);

    assert_eq!(decision.match_fraction, 1.0);
    assert!(decision.score >= 80, "score {}", decision.score);
    assert_eq!(decision.tier, LeadTier::Hot);
}

#[test]
fn test_free_plan_gets_one_next_action() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    let lead = candidate(extract(HOT_PAGE, &url));

    let decision = LeadRouter::new().route(&lead, &stretch_wrap_intent(), PlanTier::Free);
    assert!(decision.next_actions.len() <= 1);
}

#[test]
fn test_empty_page_is_skipped() {
    let url = Url::parse("https://quiet.ca/").unwrap();
    let signals = extract("<html><body><p>Welcome to our family bakery.</p></body></html>", &url);

    let decision = LeadRouter::new().route(&candidate(signals), &stretch_wrap_intent(), PlanTier::Pro);

    assert_eq!(decision.tier, LeadTier::Skip);
    assert!(decision.score < 50);
    // Email is the fallback when a page offers no contact surface
    assert!(!decision.preferred_channels.is_empty());
}

#[test]
fn test_no_focus_terms_give_neutral_match() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    let signals = extract(HOT_PAGE, &url);

    let router = LeadRouter::new();
    assert_eq!(router.match_fraction(&UserIntent::default(), &signals), 0.5);
}

#[test]
fn test_score_stays_in_range() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    let signals = extract(HOT_PAGE, &url);
    let router = LeadRouter::new();

    for weights in [
        ScoringWeights::default(),
        ScoringWeights {
            demand: 50.0,
            procurement: 50.0,
            ops: 0.0,
            reputation: 0.0,
            urgency: 0.0,
        },
        ScoringWeights {
            demand: -1.0,
            procurement: f64::NAN,
            ops: 0.0,
            reputation: 0.0,
            urgency: 0.0,
        },
    ] {
        let intent = UserIntent {
            weights,
            ..stretch_wrap_intent()
        };
        for fit in [0.0, 0.5, 1.0] {
            assert!(router.score(&intent, &signals, fit) <= 100);
        }
    }
}

#[test]
fn test_tier_never_drops_as_inputs_rise() {
    let fractions = [0.0, 0.3, 0.4, 0.55, 0.75, 1.0];

    for strong in [false, true] {
        for high_ops in [false, true] {
            for score in 0..=100u8 {
                for pair in fractions.windows(2) {
                    let lower = classify(score, pair[0], strong, high_ops);
                    let higher = classify(score, pair[1], strong, high_ops);
                    assert!(higher >= lower, "score {} fit {:?}", score, pair);
                }
                if score < 100 {
                    for fit in fractions {
                        assert!(
                            classify(score + 1, fit, strong, high_ops)
                                >= classify(score, fit, strong, high_ops)
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_extraction_is_repeatable() {
    let url = Url::parse("https://acmesupply.ca/").unwrap();
    assert_eq!(extract(HOT_PAGE, &url), extract(HOT_PAGE, &url));
}
