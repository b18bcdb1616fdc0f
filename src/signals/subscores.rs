//! Derived subscores
//!
//! Turning raw findings into the five `[0, 1]` subscores is policy: the
//! constants live in [`SubscoreWeights`] and can be tuned without touching
//! extraction.

use serde::{Deserialize, Serialize};

/// The five derived subscores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscores {
    pub demand: f64,
    pub procurement: f64,
    pub ops: f64,
    pub reputation: f64,
    pub urgency: f64,
}

impl Subscores {
    /// Values in the order demand, procurement, ops, reputation, urgency
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.demand,
            self.procurement,
            self.ops,
            self.reputation,
            self.urgency,
        ]
    }
}

/// Counts and flags the subscores are computed from
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalCounts {
    pub packaging: usize,
    pub rfq: usize,
    pub reviews: usize,
    pub ops: usize,
    pub urgency: usize,
    pub competitors: usize,
    pub emails: usize,
    pub careers_links: usize,
    pub has_cart: bool,
    pub has_platform: bool,
    pub has_analytics: bool,
    pub has_contact_form: bool,
    pub hiring: bool,
    pub has_blog_date: bool,
}

/// Weighting constants for each subscore
///
/// Counts pass through `n / (n + half)` so the first few hits matter most;
/// `half` is the count that earns half of a term's weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SubscoreWeights {
    pub demand_packaging: f64,
    pub demand_cart: f64,
    /// Any RFQ or procurement phrase; a buyer asking for quotes is demand
    pub demand_rfq: f64,
    pub demand_platform: f64,
    pub demand_analytics: f64,
    pub demand_competitors: f64,
    pub procurement_rfq: f64,
    pub procurement_contact_form: f64,
    pub procurement_emails: f64,
    pub ops_terms: f64,
    pub ops_hiring: f64,
    pub ops_careers: f64,
    pub reputation_reviews: f64,
    pub reputation_blog: f64,
    pub urgency_phrases: f64,
    pub urgency_rfq: f64,
    pub urgency_hiring: f64,
    pub packaging_half: f64,
    pub ops_half: f64,
}

impl Default for SubscoreWeights {
    fn default() -> Self {
        Self {
            demand_packaging: 0.4,
            demand_cart: 0.35,
            demand_rfq: 0.3,
            demand_platform: 0.15,
            demand_analytics: 0.1,
            demand_competitors: 0.15,
            procurement_rfq: 0.6,
            procurement_contact_form: 0.2,
            procurement_emails: 0.2,
            ops_terms: 0.55,
            ops_hiring: 0.25,
            ops_careers: 0.2,
            reputation_reviews: 0.7,
            reputation_blog: 0.3,
            urgency_phrases: 0.6,
            urgency_rfq: 0.25,
            urgency_hiring: 0.15,
            packaging_half: 2.0,
            ops_half: 3.0,
        }
    }
}

fn saturate(count: usize, half: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    n / (n + half.max(f64::EPSILON))
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Clamps to `[0, 1]`, mapping NaN to zero
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl SubscoreWeights {
    /// Computes all five subscores from raw counts
    pub fn score(&self, c: &SignalCounts) -> Subscores {
        let demand = self.demand_packaging * saturate(c.packaging, self.packaging_half)
            + self.demand_cart * flag(c.has_cart)
            + self.demand_rfq * flag(c.rfq > 0)
            + self.demand_platform * flag(c.has_platform)
            + self.demand_analytics * flag(c.has_analytics)
            + self.demand_competitors * saturate(c.competitors, 1.0);

        let procurement = self.procurement_rfq * saturate(c.rfq, 1.0)
            + self.procurement_contact_form * flag(c.has_contact_form)
            + self.procurement_emails * saturate(c.emails, 1.0);

        let ops = self.ops_terms * saturate(c.ops, self.ops_half)
            + self.ops_hiring * flag(c.hiring)
            + self.ops_careers * saturate(c.careers_links, 1.0);

        let reputation = self.reputation_reviews * saturate(c.reviews, 1.0)
            + self.reputation_blog * flag(c.has_blog_date);

        let urgency = self.urgency_phrases * saturate(c.urgency, 1.0)
            + self.urgency_rfq * saturate(c.rfq, 1.0)
            + self.urgency_hiring * flag(c.hiring);

        Subscores {
            demand: clamp_unit(demand),
            procurement: clamp_unit(procurement),
            ops: clamp_unit(ops),
            reputation: clamp_unit(reputation),
            urgency: clamp_unit(urgency),
        }
    }
}
