//! Lead-Crawler: discovery, polite crawling and scoring of sales leads
//!
//! This crate turns a small set of discovery intents into bounded, polite,
//! rate-limited fetches, extracts signals from the fetched pages and produces
//! a ranked, tiered list of leads.

pub mod compliance;
pub mod config;
pub mod crawler;
pub mod feedback;
pub mod model;
pub mod output;
pub mod providers;
pub mod queue;
pub mod rate_limit;
pub mod router;
pub mod signals;
pub mod storage;
pub mod sweep;
pub mod url;

use thiserror::Error;

/// Main error type for Lead-Crawler operations
#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker is already running")]
    WorkerRunning,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Lead-Crawler operations
pub type Result<T> = std::result::Result<T, LeadError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlResult, CrawlScheduler, CrawlStatus, CrawlTask, CrawlWorker};
pub use model::{GeoTarget, PlanTier, Region, ScoringWeights, UserIntent};
pub use rate_limit::RateLimiter;
pub use router::{LeadRouteDecision, LeadRouter, LeadTier, RoutedLead};
pub use signals::{extract, ExtractedSignals, SignalExtractor};
pub use sweep::{OrgSweepScheduler, TaskEnvelope};
pub use url::{host_key, normalize_url};
