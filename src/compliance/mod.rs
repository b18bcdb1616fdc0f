//! Crawl policy gate and PII redaction
//!
//! The worker asks a [`ComplianceGate`] before every fetch and runs free-plan
//! excerpts through its redaction function. Robots.txt rules feed the gate's
//! `robots_allowed` input via [`RobotsCache`].

mod robots;

pub use robots::{RobotsCache, RobotsRules, RobotsVerdict};

use regex::Regex;

/// Placeholder written over redacted email addresses
pub const REDACTED_EMAIL: &str = "[email]";

/// Placeholder written over redacted phone numbers
pub const REDACTED_PHONE: &str = "[phone]";

/// Yes/no crawl policy plus a redaction function
pub trait ComplianceGate: Send + Sync {
    /// Whether a fetch may proceed; unknown inputs are passed as `true`
    fn is_crawl_allowed(&self, robots_allowed: bool, terms_allow: bool) -> bool;

    fn redact_pii(&self, text: &str) -> String;
}

/// Honors both inputs and masks emails and phone numbers
#[derive(Debug, Clone)]
pub struct DefaultCompliance {
    email: Option<Regex>,
    phone: Option<Regex>,
}

impl Default for DefaultCompliance {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCompliance {
    pub fn new() -> Self {
        let compile = |pattern: &str| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(error = %e, "Redaction pattern failed to compile");
                None
            }
        };

        Self {
            email: compile(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,24}\b"),
            phone: compile(r"(?:\+?\d{1,3}[\s.-]?)?\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b"),
        }
    }
}

impl ComplianceGate for DefaultCompliance {
    fn is_crawl_allowed(&self, robots_allowed: bool, terms_allow: bool) -> bool {
        robots_allowed && terms_allow
    }

    fn redact_pii(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        if let Some(re) = &self.email {
            redacted = re.replace_all(&redacted, REDACTED_EMAIL).into_owned();
        }
        if let Some(re) = &self.phone {
            redacted = re.replace_all(&redacted, REDACTED_PHONE).into_owned();
        }
        redacted
    }
}

/// Allows everything and redacts nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveCompliance;

impl ComplianceGate for PermissiveCompliance {
    fn is_crawl_allowed(&self, _robots_allowed: bool, _terms_allow: bool) -> bool {
        true
    }

    fn redact_pii(&self, text: &str) -> String {
        text.to_string()
    }
}
