//! Host keys, registrable domains and TLD region guesses

use crate::model::Region;

/// Lowercases a host and strips a leading `www.`
///
/// This is the key used for per-host politeness, seed dedupe and denylist
/// matching, so `www.acme.ca` and `acme.ca` count as one host.
pub fn host_key(host: &str) -> String {
    let lower = host.trim().trim_end_matches('.').to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Second-level labels under which registrations happen one level deeper
const SECOND_LEVEL: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu"];

/// Returns the registrable ("bare") domain of a host, e.g. `shop.acme.co.uk` → `acme.co.uk`
pub fn bare_domain(host: &str) -> String {
    let key = host_key(host);
    let labels: Vec<&str> = key.split('.').collect();
    if labels.len() <= 2 {
        return key;
    }

    let n = labels.len();
    let take = if labels[n - 1].len() == 2 && SECOND_LEVEL.contains(&labels[n - 2]) {
        3
    } else {
        2
    };
    labels[n - take..].join(".")
}

/// Best-effort region guess from a host's country-code TLD
///
/// This is advisory only and never used as authoritative geolocation.
pub fn guess_region(host: &str) -> Option<Region> {
    let key = host_key(host);
    let tld = key.rsplit('.').next()?;

    let country = match tld {
        "ca" => "Canada",
        "us" => "United States",
        "uk" => "United Kingdom",
        "au" => "Australia",
        "nz" => "New Zealand",
        "ie" => "Ireland",
        "de" => "Germany",
        "fr" => "France",
        "nl" => "Netherlands",
        "mx" => "Mexico",
        "in" => "India",
        _ => return None,
    };

    Some(Region::country(country))
}
