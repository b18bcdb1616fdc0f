//! Static term lists matched against page text
//!
//! A [`Lexicon`] is plain data injected into the extractor, so alternate
//! vocabularies can be swapped in without touching the matching code.

use regex::Regex;
use serde::Deserialize;

/// Term lists used by the signal extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Lexicon {
    pub packaging_terms: Vec<String>,
    pub rfq_phrases: Vec<String>,
    pub review_platforms: Vec<String>,
    pub ops_terms: Vec<String>,
    pub urgency_phrases: Vec<String>,
    pub competitor_brands: Vec<String>,
    pub hiring_phrases: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            packaging_terms: strings(&[
                "stretch wrap",
                "stretch film",
                "pallet wrap",
                "pallet film",
                "shrink wrap",
                "shrink film",
                "corrugated boxes",
                "corrugated box",
                "shipping boxes",
                "cardboard boxes",
                "mailer boxes",
                "poly mailers",
                "mailer bags",
                "bubble wrap",
                "packing tape",
                "void fill",
                "strapping",
                "kraft paper",
                "custom packaging",
                "labels",
            ]),
            rfq_phrases: strings(&[
                "rfq",
                "rfp",
                "request for quote",
                "request a quote",
                "request for proposal",
                "tender",
                "bid opportunity",
                "supplier registration",
                "vendor registration",
                "purchase order",
            ]),
            review_platforms: strings(&[
                "trustpilot",
                "google reviews",
                "yelp",
                "better business bureau",
                "bbb",
                "reviews.io",
                "judge.me",
                "yotpo",
                "okendo",
                "feefo",
            ]),
            ops_terms: strings(&[
                "warehouse",
                "fulfillment",
                "fulfilment",
                "distribution center",
                "3pl",
                "logistics",
                "pallets",
                "inventory",
                "same-day shipping",
                "wholesale",
                "manufacturing",
            ]),
            urgency_phrases: strings(&[
                "urgent",
                "asap",
                "immediately",
                "rush order",
                "deadline",
                "limited time",
                "expanding",
                "grand opening",
                "new location",
            ]),
            competitor_brands: strings(&[
                "uline",
                "sealed air",
                "berry global",
                "intertape",
                "pregis",
                "ranpak",
                "westrock",
                "international paper",
            ]),
            hiring_phrases: strings(&[
                "we're hiring",
                "we are hiring",
                "now hiring",
                "join our team",
                "open positions",
            ]),
        }
    }
}

/// One compiled term list
#[derive(Debug, Clone)]
pub(crate) struct TermSet {
    terms: Vec<(String, Regex)>,
}

impl TermSet {
    fn compile(terms: &[String]) -> Self {
        let terms = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .filter_map(|term| {
                let pattern = format!(r"(?i)(?:^|[^\w]){}(?:$|[^\w])", regex::escape(&term));
                match Regex::new(&pattern) {
                    Ok(re) => Some((term, re)),
                    Err(e) => {
                        tracing::warn!(term = %term, error = %e, "Skipping unusable lexicon term");
                        None
                    }
                }
            })
            .collect();
        Self { terms }
    }

    /// Terms present in `text`, in lexicon order, without duplicates
    pub(crate) fn hits(&self, text: &str) -> Vec<String> {
        let mut hits: Vec<String> = Vec::new();
        for (term, re) in &self.terms {
            if re.is_match(text) && !hits.contains(term) {
                hits.push(term.clone());
            }
        }
        hits
    }
}

/// A [`Lexicon`] with its regular expressions built once
#[derive(Debug, Clone)]
pub(crate) struct CompiledLexicon {
    pub packaging: TermSet,
    pub rfq: TermSet,
    pub reviews: TermSet,
    pub ops: TermSet,
    pub urgency: TermSet,
    pub competitors: TermSet,
    pub hiring: TermSet,
}

impl CompiledLexicon {
    pub(crate) fn new(lexicon: &Lexicon) -> Self {
        Self {
            packaging: TermSet::compile(&lexicon.packaging_terms),
            rfq: TermSet::compile(&lexicon.rfq_phrases),
            reviews: TermSet::compile(&lexicon.review_platforms),
            ops: TermSet::compile(&lexicon.ops_terms),
            urgency: TermSet::compile(&lexicon.urgency_phrases),
            competitors: TermSet::compile(&lexicon.competitor_brands),
            hiring: TermSet::compile(&lexicon.hiring_phrases),
        }
    }
}
