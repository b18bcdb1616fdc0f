//! Shared domain types: plan tiers, regions, user intent and scoring weights

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tier of the tenant a piece of work belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Scale,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::Scale];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Scale => "scale",
        }
    }

    /// Returns true for tiers that pay for the product
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "scale" => Ok(Self::Scale),
            other => Err(format!("unknown plan tier '{}'", other)),
        }
    }
}

/// Advisory geographic region attached to a task or lead
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Region {
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: None,
        }
    }
}

/// A geographic target declared by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoTarget {
    pub country: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl GeoTarget {
    /// Human-readable location label used in discovery queries
    pub fn label(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(city) = self.city.as_deref().filter(|c| !c.is_empty()) {
            parts.push(city);
        }
        if let Some(region) = self.region.as_deref().filter(|r| !r.is_empty()) {
            parts.push(region);
        }
        parts.push(&self.country);
        parts.join(", ")
    }
}

/// Relative importance of the five signal subscores
///
/// Weights need not sum to one; they are renormalized at score time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub demand: f64,
    pub procurement: f64,
    pub ops: f64,
    pub reputation: f64,
    pub urgency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            demand: 0.3,
            procurement: 0.25,
            ops: 0.2,
            reputation: 0.1,
            urgency: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Returns the weights scaled to sum to one
    ///
    /// Negative and non-finite weights count as zero. If nothing is left,
    /// every subscore gets an equal share.
    pub fn normalized(&self) -> [f64; 5] {
        let raw = [
            self.demand,
            self.procurement,
            self.ops,
            self.reputation,
            self.urgency,
        ]
        .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 });

        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return [0.2; 5];
        }
        raw.map(|w| w / total)
    }
}

/// What a user (or an org profile) is looking for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserIntent {
    /// Product focus terms, e.g. "stretch wrap"
    pub focuses: Vec<String>,
    pub geo: Vec<GeoTarget>,
    /// Overrides the configured intent phrases when non-empty
    pub intent_phrases: Vec<String>,
    /// Overrides the configured platform hints when non-empty
    pub platform_hints: Vec<String>,
    pub extra_keywords: Vec<String>,
    /// The caller's own website, enables competitor mining
    pub website: Option<String>,
    pub weights: ScoringWeights,
    pub org_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tier_parse() {
        assert_eq!("free".parse::<PlanTier>().unwrap(), PlanTier::Free);
        assert_eq!(" Scale ".parse::<PlanTier>().unwrap(), PlanTier::Scale);
        assert!("enterprise".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_plan_tier_is_paid() {
        assert!(!PlanTier::Free.is_paid());
        assert!(PlanTier::Pro.is_paid());
        assert!(PlanTier::Scale.is_paid());
    }

    #[test]
    fn test_weights_normalized_sum_to_one() {
        let weights = ScoringWeights {
            demand: 2.0,
            procurement: 1.0,
            ops: 1.0,
            reputation: 0.0,
            urgency: 0.0,
        };
        let n = weights.normalized();
        assert!((n.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((n[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weights_all_zero_fall_back_to_equal() {
        let weights = ScoringWeights {
            demand: 0.0,
            procurement: 0.0,
            ops: -1.0,
            reputation: f64::NAN,
            urgency: 0.0,
        };
        assert_eq!(weights.normalized(), [0.2; 5]);
    }

    #[test]
    fn test_geo_label() {
        let geo = GeoTarget {
            country: "Canada".to_string(),
            region: Some("Ontario".to_string()),
            city: Some("Toronto".to_string()),
        };
        assert_eq!(geo.label(), "Toronto, Ontario, Canada");
    }
}
