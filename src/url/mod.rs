//! URL handling module for Lead-Crawler
//!
//! This module provides URL normalization (the crawl dedupe key), host
//! extraction, denylist matching and a best-effort TLD region guess.

mod domain;
mod matcher;
mod normalize;

pub use domain::{bare_domain, guess_region, host_key};
pub use matcher::matches_denylist;
pub use normalize::{normalize_url, strip_fragment};

/// Returns true if the URL points at a social-network profile
///
/// Social profiles are contact surfaces, not lead websites, so discovery
/// drops them before they become seeds.
pub fn is_social_profile(host: &str) -> bool {
    const SOCIAL_HOSTS: &[&str] = &[
        "facebook.com",
        "instagram.com",
        "linkedin.com",
        "twitter.com",
        "x.com",
        "tiktok.com",
        "youtube.com",
        "pinterest.com",
        "threads.net",
    ];

    let key = host_key(host);
    SOCIAL_HOSTS
        .iter()
        .any(|social| key == *social || key.ends_with(&format!(".{}", social)))
}

/// Returns true if the URL path names a PDF document
pub fn is_pdf(url: &::url::Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
