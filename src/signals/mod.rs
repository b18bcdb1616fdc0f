//! Signal extraction from fetched pages
//!
//! [`SignalExtractor::extract`] is a pure function of the page bytes and URL:
//! no network, queue or clock access, and identical input always yields an
//! identical [`ExtractedSignals`]. Lists come out in lexicon or sorted order,
//! never in hash order.

mod dates;
mod fingerprints;
mod lexicon;
mod page;
mod subscores;

pub use lexicon::Lexicon;
pub use subscores::{SignalCounts, SubscoreWeights, Subscores};

pub(crate) use subscores::clamp_unit;

use crate::url::{host_key, is_social_profile};
use chrono::NaiveDate;
use dates::DateScanner;
use fingerprints::{normalize_phone, Fingerprints};
use lexicon::CompiledLexicon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

/// Upper bound on harvested careers links
const MAX_CAREERS_LINKS: usize = 10;

const CAREERS_MARKERS: [&str; 5] = ["career", "jobs", "join-our-team", "join our team", "hiring"];

const MESSAGING_HOSTS: [&str; 5] = ["wa.me", "whatsapp.com", "m.me", "messenger.com", "t.me"];

/// Everything found on one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSignals {
    pub packaging_keywords: Vec<String>,
    pub rfq_phrases: Vec<String>,
    pub review_platforms: Vec<String>,
    pub ops_terms: Vec<String>,
    pub urgency_phrases: Vec<String>,
    pub competitor_mentions: Vec<String>,
    pub hiring_phrases: Vec<String>,

    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub social_profiles: Vec<String>,
    pub messaging_links: Vec<String>,
    pub careers_links: Vec<String>,

    pub has_cart: bool,
    pub has_contact_form: bool,
    /// Storefront platforms recognized from markup signatures
    pub platforms: Vec<String>,
    pub analytics: Vec<String>,

    /// Hiring phrases present or careers links found
    pub hiring: bool,
    pub latest_blog_date: Option<NaiveDate>,

    pub subscores: Subscores,
}

impl ExtractedSignals {
    /// RFQ phrases present or an active cart
    pub fn strong_intent(&self) -> bool {
        !self.rfq_phrases.is_empty() || self.has_cart
    }
}

/// Signals plus the page facts needed to build a lead
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub signals: ExtractedSignals,
    /// Visible text, whitespace-collapsed
    pub text: String,
    pub title: Option<String>,
    pub company_guess: Option<String>,
}

/// Extracts [`ExtractedSignals`] from HTML
///
/// Lexicon and weighting constants are injected at construction so tests and
/// deployments can substitute their own.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    lexicon: CompiledLexicon,
    fingerprints: Fingerprints,
    dates: DateScanner,
    weights: SubscoreWeights,
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(&Lexicon::default(), SubscoreWeights::default())
    }
}

impl SignalExtractor {
    pub fn new(lexicon: &Lexicon, weights: SubscoreWeights) -> Self {
        Self {
            lexicon: CompiledLexicon::new(lexicon),
            fingerprints: Fingerprints::new(),
            dates: DateScanner::new(),
            weights,
        }
    }

    pub fn weights(&self) -> &SubscoreWeights {
        &self.weights
    }

    /// Extracts signals from `html` fetched from `url`
    pub fn extract(&self, html: &str, url: &Url) -> ExtractedSignals {
        self.analyze(html, url).signals
    }

    /// Extracts signals and keeps the flattened text, title and company guess
    ///
    /// # Arguments
    ///
    /// * `html` - Page markup, possibly truncated by the byte budget
    /// * `url` - Final URL of the page, used to resolve relative links
    pub fn analyze(&self, html: &str, url: &Url) -> PageAnalysis {
        let parsed = page::parse_page(html, url);
        let text = parsed.text.as_str();
        let lex = &self.lexicon;

        let packaging_keywords = lex.packaging.hits(text);
        let rfq_phrases = lex.rfq.hits(text);
        let review_platforms = lex.reviews.hits(text);
        let ops_terms = lex.ops.hits(text);
        let urgency_phrases = lex.urgency.hits(text);
        let competitor_mentions = lex.competitors.hits(text);
        let hiring_phrases = lex.hiring.hits(text);

        let mut emails: BTreeSet<String> = self.fingerprints.emails(text).into_iter().collect();
        let mut phones: BTreeSet<String> = self.fingerprints.phones(text).into_iter().collect();
        let mut social_profiles = BTreeSet::new();
        let mut messaging_links = BTreeSet::new();
        let mut careers_links = BTreeSet::new();
        let page_host = url.host_str().map(host_key);

        for anchor in &parsed.anchors {
            let lower = anchor.href.to_ascii_lowercase();
            if let Some(address) = lower.strip_prefix("mailto:") {
                let address = address.split('?').next().unwrap_or_default().trim();
                if address.contains('@') {
                    emails.insert(address.to_string());
                }
                continue;
            }
            if let Some(number) = lower.strip_prefix("tel:") {
                let number = normalize_phone(number);
                if number.len() >= 7 {
                    phones.insert(number);
                }
                continue;
            }

            let Some(target) = &anchor.absolute else {
                continue;
            };
            let Some(host) = target.host_str().map(host_key) else {
                continue;
            };

            if is_social_profile(&host) {
                social_profiles.insert(target.to_string());
            } else if MESSAGING_HOSTS.contains(&host.as_str()) {
                messaging_links.insert(target.to_string());
            } else if host.starts_with("careers.") || host.starts_with("jobs.") {
                careers_links.insert(target.to_string());
            } else if Some(&host) == page_host.as_ref() {
                let haystack = format!(
                    "{} {}",
                    target.path().to_ascii_lowercase(),
                    anchor.text.to_ascii_lowercase()
                );
                if CAREERS_MARKERS.iter().any(|marker| haystack.contains(marker)) {
                    careers_links.insert(target.to_string());
                }
            }
        }

        let careers_links: Vec<String> =
            careers_links.into_iter().take(MAX_CAREERS_LINKS).collect();
        let platforms = Fingerprints::matching(&self.fingerprints.platforms, html);
        let analytics = Fingerprints::matching(&self.fingerprints.analytics, html);
        let has_cart = self.fingerprints.has_cart(html);
        let hiring = !hiring_phrases.is_empty() || !careers_links.is_empty();
        let latest_blog_date = self
            .dates
            .latest(text, parsed.time_stamps.iter().map(String::as_str));

        let counts = SignalCounts {
            packaging: packaging_keywords.len(),
            rfq: rfq_phrases.len(),
            reviews: review_platforms.len(),
            ops: ops_terms.len(),
            urgency: urgency_phrases.len(),
            competitors: competitor_mentions.len(),
            emails: emails.len(),
            careers_links: careers_links.len(),
            has_cart,
            has_platform: !platforms.is_empty(),
            has_analytics: !analytics.is_empty(),
            has_contact_form: parsed.has_contact_form,
            hiring,
            has_blog_date: latest_blog_date.is_some(),
        };

        let signals = ExtractedSignals {
            packaging_keywords,
            rfq_phrases,
            review_platforms,
            ops_terms,
            urgency_phrases,
            competitor_mentions,
            hiring_phrases,
            emails: emails.into_iter().collect(),
            phones: phones.into_iter().collect(),
            social_profiles: social_profiles.into_iter().collect(),
            messaging_links: messaging_links.into_iter().collect(),
            careers_links,
            has_cart,
            has_contact_form: parsed.has_contact_form,
            platforms,
            analytics,
            hiring,
            latest_blog_date,
            subscores: self.weights.score(&counts),
        };

        PageAnalysis {
            company_guess: company_guess(parsed.site_name.as_deref(), parsed.title.as_deref()),
            title: parsed.title,
            text: parsed.text,
            signals,
        }
    }
}

/// `og:site_name`, else the leading segment of the title
fn company_guess(site_name: Option<&str>, title: Option<&str>) -> Option<String> {
    if let Some(name) = site_name.map(str::trim).filter(|n| !n.is_empty()) {
        return Some(name.to_string());
    }

    let title = title?;
    let head = [" | ", " - ", " – ", " — ", " :: "]
        .iter()
        .filter_map(|sep| title.split_once(sep).map(|(head, _)| head))
        .min_by_key(|head| head.len())
        .unwrap_or(title)
        .trim();

    (!head.is_empty()).then(|| head.to_string())
}

/// Extracts signals with the default lexicon and weights
pub fn extract(html: &str, url: &Url) -> ExtractedSignals {
    static DEFAULT: OnceLock<SignalExtractor> = OnceLock::new();
    DEFAULT.get_or_init(SignalExtractor::default).extract(html, url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Acme Packaging | Wholesale Stretch Wrap</title>
  <script src="https://cdn.shopify.com/s/files/theme.js"></script>
  <script>gtag('config', 'G-XYZ');</script>
</head>
<body>
  <h1>Stretch wrap and corrugated boxes</h1>
  <p>Request a quote for bulk pallet film. Rush order? We ship from our warehouse.</p>
  <p>Rated 4.9 on Trustpilot. Switching from Uline? Talk to us.</p>
  <p>Posted March 5, 2024 and updated 2024-06-01.</p>
  <button>Add to cart</button>
  <a href="mailto:sales@acme.ca?subject=Quote">Email sales</a>
  <a href="tel:+1-416-555-0199">Call</a>
  <a href="/careers">We're hiring</a>
  <a href="https://www.linkedin.com/company/acme">LinkedIn</a>
  <a href="https://wa.me/14165550199">WhatsApp</a>
  <form><input type="email" name="email"><textarea></textarea></form>
</body>
</html>"#;

    fn url() -> Url {
        Url::parse("https://acme.ca/").unwrap()
    }

    #[test]
    fn test_extract_full_page() {
        let signals = extract(PAGE, &url());

        assert_eq!(
            signals.packaging_keywords,
            vec!["stretch wrap", "pallet film", "corrugated boxes"]
        );
        assert_eq!(signals.rfq_phrases, vec!["request a quote"]);
        assert_eq!(signals.review_platforms, vec!["trustpilot"]);
        assert_eq!(signals.competitor_mentions, vec!["uline"]);
        assert!(signals.ops_terms.contains(&"warehouse".to_string()));
        assert!(signals.urgency_phrases.contains(&"rush order".to_string()));

        assert_eq!(signals.emails, vec!["sales@acme.ca"]);
        assert_eq!(signals.phones, vec!["+14165550199"]);
        assert_eq!(signals.careers_links, vec!["https://acme.ca/careers"]);
        assert_eq!(
            signals.social_profiles,
            vec!["https://www.linkedin.com/company/acme"]
        );
        assert_eq!(signals.messaging_links, vec!["https://wa.me/14165550199"]);

        assert!(signals.has_cart);
        assert!(signals.has_contact_form);
        assert!(signals.hiring);
        assert_eq!(signals.platforms, vec!["shopify"]);
        assert_eq!(signals.analytics, vec!["google-analytics"]);
        assert_eq!(signals.latest_blog_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert!(signals.strong_intent());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let extractor = SignalExtractor::default();
        let first = serde_json::to_vec(&extractor.extract(PAGE, &url())).unwrap();
        let second = serde_json::to_vec(&extractor.extract(PAGE, &url())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_subscores_in_range() {
        for html in ["", "<html></html>", PAGE, "<p>rfq rfq rfq</p>"] {
            let signals = extract(html, &url());
            for value in signals.subscores.as_array() {
                assert!((0.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_empty_page_has_no_signals() {
        let signals = extract("", &url());
        assert_eq!(signals, ExtractedSignals::default());
        assert!(!signals.strong_intent());
    }

    #[test]
    fn test_script_text_not_matched() {
        let html = "<script>var note = 'request a quote';</script><p>Hello</p>";
        assert!(extract(html, &url()).rfq_phrases.is_empty());
    }

    #[test]
    fn test_custom_lexicon() {
        let lexicon = Lexicon {
            packaging_terms: vec!["gaylord boxes".to_string()],
            ..Lexicon::default()
        };
        let extractor = SignalExtractor::new(&lexicon, SubscoreWeights::default());
        let signals = extractor.extract("<p>We buy Gaylord Boxes weekly</p>", &url());
        assert_eq!(signals.packaging_keywords, vec!["gaylord boxes"]);
    }

    #[test]
    fn test_company_guess() {
        let analysis = SignalExtractor::default().analyze(PAGE, &url());
        assert_eq!(analysis.company_guess.as_deref(), Some("Acme Packaging"));

        assert_eq!(
            company_guess(Some("Acme Ltd"), Some("Home | Other")),
            Some("Acme Ltd".to_string())
        );
        assert_eq!(company_guess(None, Some("Solo Title")), Some("Solo Title".to_string()));
        assert_eq!(company_guess(None, None), None);
    }
}
