//! Dedupe keys and fetch URLs
//!
//! Two views of one URL: the fetch URL keeps everything the server might
//! care about, the dedupe key folds away the variations that point at the
//! same page (host case, `www.`, tracking parameters, slashes, fragments).

use crate::url::domain::host_key;
use crate::UrlError;
use url::Url;

/// Parameters dropped outright
const TRACKING_PARAMS: [&str; 9] = [
    "fbclid", "gclid", "dclid", "msclkid", "yclid", "_ga", "_gl", "ref", "source",
];

/// Parameter families dropped by prefix (`utm_source`, `mc_eid`, `hsa_cam`, ...)
const TRACKING_PREFIXES: [&str; 4] = ["utm_", "mc_", "hsa_", "pk_"];

fn parse_web_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }
    Ok(url)
}

/// Normalizes a URL into the crawl dedupe key
///
/// The host is lowercased and loses a leading `www.`, dot segments and
/// empty or trailing path segments are folded away, tracking parameters are
/// removed and the remaining parameters are sorted. The fragment is dropped.
///
/// ```
/// use lead_crawler::url::normalize_url;
///
/// let url = normalize_url("https://WWW.ACME.CA/shop/#top").unwrap();
/// assert_eq!(url.as_str(), "https://acme.ca/shop");
/// ```
///
/// # Errors
///
/// Returns `UrlError` for unparseable, host-less or non-HTTP(S) input.
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = parse_web_url(raw)?;

    let host = url.host_str().map(host_key).unwrap_or_default();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("cannot set host {}: {}", host, e)))?;

    let path = fold_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let query = kept_query(&url);
    url.set_query(query.as_deref());

    Ok(url)
}

/// Parses a URL for fetching: only the fragment is removed
///
/// # Errors
///
/// Same as [`normalize_url`].
pub fn strip_fragment(raw: &str) -> Result<Url, UrlError> {
    let mut url = parse_web_url(raw)?;
    url.set_fragment(None);
    Ok(url)
}

/// `/a/./b/../c//d/` → `/a/c/d`; the root stays `/`
fn fold_path(path: &str) -> String {
    let folded = path.split('/').fold(Vec::new(), |mut kept, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                kept.pop();
            }
            _ => kept.push(segment),
        }
        kept
    });

    format!("/{}", folded.join("/"))
}

/// Non-tracking parameters sorted by key, or `None` when nothing is left
fn kept_query(url: &Url) -> Option<String> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        return None;
    }

    params.sort();
    Some(
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&"),
    )
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str())
        || TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        normalize_url(raw).unwrap().to_string()
    }

    #[test]
    fn test_host_folding() {
        assert_eq!(key("https://WWW.Acme.CA/Products"), "https://acme.ca/Products");
        assert_eq!(key("http://acme.ca"), "http://acme.ca/");
    }

    #[test]
    fn test_path_folding() {
        assert_eq!(key("https://acme.ca/shop/"), "https://acme.ca/shop");
        assert_eq!(key("https://acme.ca//shop///wrap"), "https://acme.ca/shop/wrap");
        assert_eq!(key("https://acme.ca/a/../b/./c"), "https://acme.ca/b/c");
        assert_eq!(key("https://acme.ca/../shop"), "https://acme.ca/shop");
    }

    #[test]
    fn test_tracking_params_removed() {
        assert_eq!(
            key("https://acme.ca/shop?utm_source=mail&utm_campaign=q3&gclid=1&fbclid=2"),
            "https://acme.ca/shop"
        );
        assert_eq!(key("https://acme.ca/?mc_eid=9&hsa_cam=4&UTM_Medium=x"), "https://acme.ca/");
    }

    #[test]
    fn test_other_params_sorted() {
        assert_eq!(
            key("https://acme.ca/search?q=film&utm_term=x&page=2"),
            "https://acme.ca/search?page=2&q=film"
        );
    }

    #[test]
    fn test_variants_share_a_key() {
        let variants = [
            "https://www.acme.ca/stretch-wrap/",
            "https://acme.ca/stretch-wrap#specs",
            "https://ACME.ca/stretch-wrap?utm_source=google",
        ];
        for variant in variants {
            assert_eq!(key(variant), "https://acme.ca/stretch-wrap");
        }
    }

    #[test]
    fn test_rejects_non_web_urls() {
        assert!(matches!(
            normalize_url("ftp://acme.ca/catalog"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(normalize_url("not a url").is_err());
        assert!(strip_fragment("mailto:sales@acme.ca").is_err());
    }

    #[test]
    fn test_strip_fragment_keeps_www_and_query() {
        let url = strip_fragment("https://www.acme.ca/shop?utm_source=x#cart").unwrap();
        assert_eq!(url.as_str(), "https://www.acme.ca/shop?utm_source=x");
    }
}
