//! Configuration module for Lead-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lead_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("leads.toml")).unwrap();
//! println!("Per-host delay: {}ms", config.crawler.per_host_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, DiscoveryConfig, OutputConfig, PlanLimits, PlansConfig, SourceEntry,
    SourceKind, SweepConfig, UserAgentConfig,
};

pub use parser::{
    compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config,
};
