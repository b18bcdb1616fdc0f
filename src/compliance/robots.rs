//! Robots.txt rules and a per-host cache
//!
//! Rules are fetched once per host and kept for 24 hours. A missing
//! robots.txt (4xx) allows everything; a network failure or 5xx leaves the
//! verdict unknown, which the worker treats as allowed.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// How long fetched rules stay valid
const CACHE_TTL_HOURS: i64 = 24;

/// Parsed robots.txt for one host
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt body; empty means allow all
    body: String,
}

impl RobotsRules {
    pub fn from_content(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `url` may be fetched by `user_agent`
    pub fn allows(&self, url: &str, user_agent: &str) -> bool {
        if self.body.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, product_token(user_agent), url)
    }

    /// `Crawl-delay` that applies to `user_agent`, preferring its own group
    /// over the `*` group
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let agent = product_token(user_agent).to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut own = None;
        let mut wildcard = None;

        for line in self.body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_rules {
                        group.clear();
                        in_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        own = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = wildcard.or(Some(delay));
                    }
                }
                _ => in_rules = true,
            }
        }

        own.or(wildcard)
    }
}

/// `Name/1.0 (+url)` → `Name`
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}

/// Outcome of a robots.txt lookup for one URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotsVerdict {
    /// `None` when the rules could not be fetched
    pub allowed: Option<bool>,
    /// Crawl delay requested for our agent, in seconds
    pub crawl_delay: Option<f64>,
}

impl RobotsVerdict {
    pub const UNKNOWN: RobotsVerdict = RobotsVerdict {
        allowed: None,
        crawl_delay: None,
    };
}

#[derive(Debug, Clone)]
struct CachedRules {
    rules: RobotsRules,
    fetched_at: DateTime<Utc>,
}

impl CachedRules {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::hours(CACHE_TTL_HOURS)
    }
}

/// Fetches and caches robots.txt per scheme + host + port
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRules>>,
    /// One fetch lock per origin with a robots.txt request in flight
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RobotsCache {
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `user_agent` - Full User-Agent header value; its product token is
    ///   matched against robots.txt groups
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn origin_key(url: &Url) -> Option<String> {
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        })
    }

    /// Seeds the cache, replacing any entry for the URL's origin
    pub fn insert(&self, url: &Url, rules: RobotsRules) {
        if let Some(key) = Self::origin_key(url) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    key,
                    CachedRules {
                        rules,
                        fetched_at: Utc::now(),
                    },
                );
        }
    }

    fn cached(&self, key: &str) -> Option<RobotsRules> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| !entry.is_stale(Utc::now()))
            .map(|entry| entry.rules.clone())
    }

    /// Looks up (fetching when needed) the rules covering `url`
    pub async fn check(&self, url: &Url) -> RobotsVerdict {
        let Some(key) = Self::origin_key(url) else {
            return RobotsVerdict::UNKNOWN;
        };

        let rules = match self.cached(&key) {
            Some(rules) => rules,
            None => match self.fetch_once(url, &key).await {
                Some(rules) => rules,
                None => return RobotsVerdict::UNKNOWN,
            },
        };

        RobotsVerdict {
            allowed: Some(rules.allows(url.as_str(), &self.user_agent)),
            crawl_delay: rules.crawl_delay(&self.user_agent),
        }
    }

    /// Fetches robots.txt for `origin` unless another caller already is;
    /// callers that queued behind that fetch read its cached result
    async fn fetch_once(&self, url: &Url, origin: &str) -> Option<RobotsRules> {
        let lock = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(origin.to_string()).or_default())
        };
        let _guard = lock.lock().await;

        if let Some(rules) = self.cached(origin) {
            return Some(rules);
        }

        let fetched = self.fetch(origin).await;
        if let Some(rules) = &fetched {
            self.insert(url, rules.clone());
        }
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(origin);
        fetched
    }

    async fn fetch(&self, origin: &str) -> Option<RobotsRules> {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!(url = %robots_url, "Fetching robots.txt");

        let response = match self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt unreachable");
                return None;
            }
        };

        let status = response.status();
        if status.is_client_error() {
            return Some(RobotsRules::allow_all());
        }
        if !status.is_success() {
            tracing::debug!(url = %robots_url, status = status.as_u16(), "robots.txt unavailable");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(RobotsRules::from_content(&body)),
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt body unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = "LeadBot/1.0 (+https://example.com/bot; bot@example.com)";

    #[test]
    fn test_allow_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.allows("https://acme.ca/admin", AGENT));
    }

    #[test]
    fn test_disallow_specific_path() {
        let rules = RobotsRules::from_content("User-agent: *\nDisallow: /admin");
        assert!(rules.allows("https://acme.ca/", AGENT));
        assert!(!rules.allows("https://acme.ca/admin/users", AGENT));
    }

    #[test]
    fn test_agent_specific_group() {
        let rules =
            RobotsRules::from_content("User-agent: LeadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(!rules.allows("https://acme.ca/page", AGENT));
        assert!(rules.allows("https://acme.ca/page", "OtherBot/2.0"));
    }

    #[test]
    fn test_garbage_allows() {
        let rules = RobotsRules::from_content("This is not valid robots.txt {{{");
        assert!(rules.allows("https://acme.ca/any", AGENT));
    }

    #[test]
    fn test_crawl_delay_groups() {
        let rules = RobotsRules::from_content(
            "User-agent: LeadBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10",
        );
        assert_eq!(rules.crawl_delay(AGENT), Some(5.0));
        assert_eq!(rules.crawl_delay("OtherBot/2.0"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let rules =
            RobotsRules::from_content("User-agent: BotA\nUser-agent: LeadBot\nCrawl-delay: 2.5");
        assert_eq!(rules.crawl_delay(AGENT), Some(2.5));
        assert_eq!(rules.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_absent() {
        let rules = RobotsRules::from_content("User-agent: *\nDisallow: /admin");
        assert_eq!(rules.crawl_delay(AGENT), None);
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token(AGENT), "LeadBot");
        assert_eq!(product_token("Plain"), "Plain");
    }

    #[test]
    fn test_cached_entries_expire() {
        let cache = RobotsCache::new(Client::new(), AGENT);
        let url = Url::parse("https://acme.ca/page").unwrap();
        cache.insert(&url, RobotsRules::from_content("User-agent: *\nDisallow: /"));

        let key = RobotsCache::origin_key(&url).unwrap();
        assert!(cache.cached(&key).is_some());

        cache
            .entries
            .lock()
            .unwrap()
            .get_mut(&key)
            .unwrap()
            .fetched_at = Utc::now() - Duration::hours(25);
        assert!(cache.cached(&key).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_fetch() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private")
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = RobotsCache::new(Client::new(), AGENT);
        let open = Url::parse(&format!("{}/shop", mock_server.uri())).unwrap();
        let private = Url::parse(&format!("{}/private/a", mock_server.uri())).unwrap();

        let (first, second, third) =
            tokio::join!(cache.check(&open), cache.check(&private), cache.check(&open));

        assert_eq!(first.allowed, Some(true));
        assert_eq!(second.allowed, Some(false));
        assert_eq!(third.allowed, Some(true));
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_uses_seeded_rules() {
        let cache = RobotsCache::new(Client::new(), AGENT);
        let url = Url::parse("https://acme.ca/private/file").unwrap();
        cache.insert(&url, RobotsRules::from_content("User-agent: *\nDisallow: /private"));

        let verdict = cache.check(&url).await;
        assert_eq!(verdict.allowed, Some(false));
    }
}
