//! Regex signatures for storefront platforms, analytics tags, carts and
//! contact details. These run against the raw markup, not the flattened text.

use regex::Regex;

/// A named signature
#[derive(Debug, Clone)]
pub(crate) struct Signature {
    pub name: &'static str,
    pub pattern: Regex,
}

const PLATFORM_SIGNATURES: [(&str, &str); 6] = [
    ("shopify", r"(?i)cdn\.shopify\.com|myshopify\.com|Shopify\.theme"),
    ("woocommerce", r"(?i)wp-content/plugins/woocommerce|woocommerce-(?:cart|page|product)"),
    ("bigcommerce", r"(?i)cdn\d*\.bigcommerce\.com|data-bc-|bigcommerce\.com/s-"),
    ("magento", r"(?i)mage/cookies|Magento_|/static/version\d+/frontend"),
    ("wix", r"(?i)static\.wixstatic\.com|wix-code|_wixCIDX"),
    ("squarespace", r"(?i)static1\.squarespace\.com|Static\.SQUARESPACE_CONTEXT"),
];

const ANALYTICS_SIGNATURES: [(&str, &str); 6] = [
    ("google-analytics", r"(?i)google-analytics\.com/(?:analytics|ga)\.js|gtag\(\s*'config'|gtag/js\?id=G-"),
    ("google-tag-manager", r"(?i)googletagmanager\.com/gtm\.js|GTM-[A-Z0-9]{4,}"),
    ("meta-pixel", r"(?i)connect\.facebook\.net/[a-z_]+/fbevents\.js|fbq\(\s*'init'"),
    ("hotjar", r"(?i)static\.hotjar\.com|hjid\s*:"),
    ("klaviyo", r"(?i)static\.klaviyo\.com|klaviyo\.com/onsite"),
    ("segment", r"(?i)cdn\.segment\.com/analytics\.js|analytics\.load\("),
];

const CART_SIGNATURE: &str =
    r#"(?i)add[\s_-]?to[\s_-]?cart|shopping[\s_-]cart|href=["'][^"']*/(?:cart|checkout)\b|data-cart|minicart|cart-count"#;

const EMAIL_PATTERN: &str = r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,24}\b";

const PHONE_PATTERN: &str = r"(?:\+?1[\s.-]?)?\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b";

/// File extensions that look like email TLDs in `logo@2x.png`-style names
const ASSET_SUFFIXES: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// All compiled signatures
#[derive(Debug, Clone)]
pub(crate) struct Fingerprints {
    pub platforms: Vec<Signature>,
    pub analytics: Vec<Signature>,
    cart: Option<Regex>,
    email: Option<Regex>,
    phone: Option<Regex>,
}

fn compile(name: &'static str, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(signature = name, error = %e, "Signature failed to compile");
            None
        }
    }
}

fn compile_all(signatures: &[(&'static str, &str)]) -> Vec<Signature> {
    signatures
        .iter()
        .filter_map(|(name, pattern)| {
            compile(name, pattern).map(|pattern| Signature { name, pattern })
        })
        .collect()
}

impl Fingerprints {
    pub(crate) fn new() -> Self {
        Self {
            platforms: compile_all(&PLATFORM_SIGNATURES),
            analytics: compile_all(&ANALYTICS_SIGNATURES),
            cart: compile("cart", CART_SIGNATURE),
            email: compile("email", EMAIL_PATTERN),
            phone: compile("phone", PHONE_PATTERN),
        }
    }

    /// Names of the signatures found in `html`, in declaration order
    pub(crate) fn matching(signatures: &[Signature], html: &str) -> Vec<String> {
        signatures
            .iter()
            .filter(|sig| sig.pattern.is_match(html))
            .map(|sig| sig.name.to_string())
            .collect()
    }

    pub(crate) fn has_cart(&self, html: &str) -> bool {
        self.cart.as_ref().map_or(false, |re| re.is_match(html))
    }

    /// Lowercased email addresses in `text`, asset filenames excluded
    pub(crate) fn emails(&self, text: &str) -> Vec<String> {
        let Some(re) = &self.email else {
            return Vec::new();
        };

        re.find_iter(text)
            .map(|m| m.as_str().to_ascii_lowercase())
            .filter(|email| !ASSET_SUFFIXES.iter().any(|ext| email.ends_with(ext)))
            .collect()
    }

    /// Phone numbers in `text`, reduced to digits (and a leading `+`)
    pub(crate) fn phones(&self, text: &str) -> Vec<String> {
        let Some(re) = &self.phone else {
            return Vec::new();
        };

        re.find_iter(text)
            .map(|m| normalize_phone(m.as_str()))
            .collect()
    }
}

pub(crate) fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if raw.trim_start().starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_signatures() {
        let fp = Fingerprints::new();
        let html = r#"<script src="https://cdn.shopify.com/s/files/theme.js"></script>"#;
        assert_eq!(Fingerprints::matching(&fp.platforms, html), vec!["shopify"]);

        let woo = r#"<link href="/wp-content/plugins/woocommerce/assets/css/woo.css">"#;
        assert_eq!(Fingerprints::matching(&fp.platforms, woo), vec!["woocommerce"]);
    }

    #[test]
    fn test_analytics_signatures() {
        let fp = Fingerprints::new();
        let html = r#"<script async src="https://www.googletagmanager.com/gtag/js?id=G-ABC123"></script>
            <script>fbq('init', '123');</script>"#;
        assert_eq!(
            Fingerprints::matching(&fp.analytics, html),
            vec!["google-analytics", "meta-pixel"]
        );
    }

    #[test]
    fn test_cart_markers() {
        let fp = Fingerprints::new();
        assert!(fp.has_cart(r#"<button class="btn">Add to Cart</button>"#));
        assert!(fp.has_cart(r#"<a href="/cart">Bag</a>"#));
        assert!(!fp.has_cart("<p>We care about carts of all kinds</p>"));
    }

    #[test]
    fn test_emails_skip_asset_names() {
        let fp = Fingerprints::new();
        let found = fp.emails("Write to Sales@Acme.ca or see logo@2x.png");
        assert_eq!(found, vec!["sales@acme.ca"]);
    }

    #[test]
    fn test_phones_normalized() {
        let fp = Fingerprints::new();
        assert_eq!(fp.phones("Call (416) 555-0199 today"), vec!["4165550199"]);
        assert_eq!(normalize_phone("+1 416.555.0199"), "+14165550199");
    }
}
