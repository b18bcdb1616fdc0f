//! Denylist matching

use crate::url::domain::{bare_domain, host_key};

/// Checks a host against one denylist entry
///
/// Matching is case-insensitive with `www.` stripped on both sides.
///
/// * `*.acme.ca` matches `acme.ca` and every subdomain of it.
/// * A plain entry matches the exact host or any host whose registrable
///   domain equals it, so `amazon.com` also removes `smile.amazon.com`.
///
/// ```
/// use lead_crawler::url::matches_denylist;
///
/// assert!(matches_denylist("uline.com", "www.uline.com"));
/// assert!(matches_denylist("*.amazon.com", "smile.amazon.com"));
/// assert!(!matches_denylist("uline.com", "notuline.com"));
/// ```
pub fn matches_denylist(entry: &str, host: &str) -> bool {
    let host = host_key(host);
    let entry = entry.trim().to_lowercase();

    match entry.strip_prefix("*.") {
        Some(base) => {
            let base = host_key(base);
            host == base || is_subdomain_of(&host, &base)
        }
        None => {
            let entry = host_key(&entry);
            host == entry || bare_domain(&host) == entry
        }
    }
}

fn is_subdomain_of(host: &str, base: &str) -> bool {
    host.strip_suffix(base)
        .map_or(false, |head| head.ends_with('.'))
}
