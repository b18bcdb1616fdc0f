use crate::model::{PlanTier, UserIntent};
use serde::Deserialize;

/// Main configuration structure for Lead-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub intent: UserIntent,
}

/// Crawl worker behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Minimum time between two fetches to the same host (milliseconds)
    pub per_host_delay_ms: u64,

    /// Fetch timeout used when a task carries no budget of its own
    pub default_timeout_ms: u64,

    pub max_redirects: usize,

    /// Number of cooperative pull loops per worker
    pub concurrency: usize,

    /// Upper bound of the worker's "already seen" URL set
    pub seen_capacity: usize,

    pub respect_robots: bool,

    pub https_only: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            per_host_delay_ms: 1000,
            default_timeout_ms: 15_000,
            max_redirects: 5,
            concurrency: 1,
            seen_capacity: 100_000,
            respect_robots: true,
            https_only: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite ledger
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown lead report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

/// Query construction and seed filtering
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Hard ceiling on queries built per discovery run
    pub max_queries: usize,

    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,

    pub intent_phrases: Vec<String>,
    pub platform_hints: Vec<String>,
    pub ops_surfaces: Vec<String>,

    /// Mega-supplier hosts that are never turned into seeds
    pub denylist: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            max_queries: 50,
            pacing_min_ms: 200,
            pacing_max_ms: 400,
            intent_phrases: strings(&["supplier", "wholesale", "bulk order", "request a quote"]),
            platform_hints: strings(&["shopify", "woocommerce"]),
            ops_surfaces: strings(&["warehouse", "fulfillment center", "distribution center"]),
            denylist: strings(&[
                "uline.com",
                "amazon.com",
                "alibaba.com",
                "walmart.com",
                "homedepot.com",
                "lowes.com",
                "staples.com",
                "grainger.com",
                "costco.com",
            ]),
        }
    }
}

/// Per-plan caps and rate-limit bucket parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlanLimits {
    /// Token refill rate of the plan bucket
    pub rate_per_sec: f64,
    pub burst: u32,
    pub max_parallel_searches: usize,
    pub max_seed_urls: usize,
    pub timeout_ms: u64,
    pub byte_budget: usize,
    /// Excerpt length for redacted excerpts; `None` keeps the full text
    pub excerpt_chars: Option<usize>,
}

impl PlanLimits {
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                rate_per_sec: 0.5,
                burst: 5,
                max_parallel_searches: 2,
                max_seed_urls: 25,
                timeout_ms: 10_000,
                byte_budget: 512 * 1024,
                excerpt_chars: Some(500),
            },
            PlanTier::Pro => Self {
                rate_per_sec: 2.0,
                burst: 20,
                max_parallel_searches: 4,
                max_seed_urls: 100,
                timeout_ms: 15_000,
                byte_budget: 2 * 1024 * 1024,
                excerpt_chars: None,
            },
            PlanTier::Scale => Self {
                rate_per_sec: 5.0,
                burst: 50,
                max_parallel_searches: 8,
                max_seed_urls: 250,
                timeout_ms: 20_000,
                byte_budget: 4 * 1024 * 1024,
                excerpt_chars: None,
            },
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::for_tier(PlanTier::Free)
    }
}

/// Limits for all plan tiers
#[derive(Debug, Clone, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "free_limits")]
    pub free: PlanLimits,
    #[serde(default = "pro_limits")]
    pub pro: PlanLimits,
    #[serde(default = "scale_limits")]
    pub scale: PlanLimits,
}

fn free_limits() -> PlanLimits {
    PlanLimits::for_tier(PlanTier::Free)
}

fn pro_limits() -> PlanLimits {
    PlanLimits::for_tier(PlanTier::Pro)
}

fn scale_limits() -> PlanLimits {
    PlanLimits::for_tier(PlanTier::Scale)
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: free_limits(),
            pro: pro_limits(),
            scale: scale_limits(),
        }
    }
}

impl PlansConfig {
    pub fn limits(&self, tier: PlanTier) -> &PlanLimits {
        match tier {
            PlanTier::Free => &self.free,
            PlanTier::Pro => &self.pro,
            PlanTier::Scale => &self.scale,
        }
    }
}

/// Periodic org sweep tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SweepConfig {
    pub interval_secs: u64,

    /// Symmetric interval jitter as a fraction of the interval
    pub jitter: f64,

    pub max_discovery_per_tick: u32,
    pub max_refresh_per_tick: u32,

    /// Backlog above `multiplier × concurrency cap` skips the org
    pub backlog_multiplier: u32,

    /// Share of the observed backlog assumed to be today's work
    pub queued_estimate_factor: f64,

    /// Upper bound of the `notBefore` stagger given to one tick's envelopes
    pub stagger_max_secs: u64,

    pub discovery_priority: u8,
    pub refresh_priority: u8,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            jitter: 0.25,
            max_discovery_per_tick: 20,
            max_refresh_per_tick: 10,
            backlog_multiplier: 2,
            queued_estimate_factor: 0.5,
            stagger_max_secs: 30,
            discovery_priority: 6,
            refresh_priority: 3,
        }
    }
}

/// Kind of a statically configured discovery source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Imports,
    Directories,
}

/// A static discovery source: a fixed URL list answered for every query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceEntry {
    pub id: String,

    #[serde(default)]
    pub kind: SourceKind,

    #[serde(default = "default_true")]
    pub free_tier: bool,

    #[serde(default)]
    pub max_per_minute: Option<u32>,

    #[serde(default = "default_relevance")]
    pub relevance: f64,

    #[serde(default)]
    pub tags: Vec<String>,

    pub urls: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_relevance() -> f64 {
    0.5
}
