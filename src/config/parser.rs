//! Config loading: TOML text → validated [`Config`] plus a content hash

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the config file at `path`
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_hash(path).map(|(config, _)| config)
}

/// Parses and validates configuration from TOML text
///
/// # Errors
///
/// `ConfigError::Parse` for malformed TOML or unknown value types,
/// `ConfigError::Validation` (or a more specific variant) when a value is
/// out of range.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 of config text
///
/// Recorded with every run, so a lead in the ledger can be traced back to
/// the exact settings that produced it.
pub fn config_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Hashes the config file at `path` without parsing it
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(config_hash(&std::fs::read_to_string(path)?))
}

/// Loads a config and hashes the same bytes that were parsed
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, config_hash(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlanTier;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[user-agent]
crawler-name = "LeadBot"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./leads.db"
report-path = "./leads.md"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.per_host_delay_ms, 1000);
        assert_eq!(config.discovery.max_queries, 50);
        assert_eq!(config.plans.limits(PlanTier::Free).timeout_ms, 10_000);
        assert_eq!(config.plans.limits(PlanTier::Scale).max_parallel_searches, 8);
        assert!(config.sources.is_empty());
        assert!(config.intent.focuses.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let content = format!(
            "{}{}",
            MINIMAL,
            r#"
[crawler]
per-host-delay-ms = 250
concurrency = 3

[discovery]
denylist = ["uline.com"]
pacing-min-ms = 0
pacing-max-ms = 0

[plans.pro]
rate-per-sec = 4.0
burst = 8
max-parallel-searches = 3
max-seed-urls = 10
timeout-ms = 5000
byte-budget = 65536

[[sources]]
id = "trade-show"
kind = "directories"
free-tier = false
max-per-minute = 10
relevance = 0.7
urls = ["https://acme.ca/", "https://boxco.com/"]

[intent]
focuses = ["stretch wrap"]
geo = [{ country = "Canada" }]
website = "https://mypack.com"

[intent.weights]
demand = 1.0
procurement = 0.0
"#
        );

        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.per_host_delay_ms, 250);
        assert_eq!(config.crawler.concurrency, 3);
        assert_eq!(config.discovery.denylist, vec!["uline.com".to_string()]);
        assert_eq!(config.plans.pro.burst, 8);
        assert_eq!(config.plans.free.timeout_ms, 10_000);
        assert_eq!(config.sources.len(), 1);
        assert!(!config.sources[0].free_tier);
        assert_eq!(config.intent.focuses, vec!["stretch wrap".to_string()]);
        assert_eq!(config.intent.geo[0].country, "Canada");
        assert_eq!(config.intent.weights.demand, 1.0);
        assert_eq!(config.intent.weights.procurement, 0.0);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/leads.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(
            parse_config("this is not valid TOML {{{"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_config(&format!("{}\n[crawler]\nconcurrency = 0\n", MINIMAL)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_output_section_rejected() {
        let without_output = MINIMAL.split("[output]").next().unwrap();
        assert!(matches!(parse_config(without_output), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = create_temp_config(MINIMAL);
        let b = create_temp_config(&format!("{}\n[crawler]\nconcurrency = 2\n", MINIMAL));

        let (_, hash_a) = load_config_with_hash(a.path()).unwrap();
        assert_eq!(hash_a.len(), 64);
        assert_eq!(hash_a, compute_config_hash(a.path()).unwrap());
        assert_eq!(hash_a, config_hash(MINIMAL));
        assert_ne!(hash_a, compute_config_hash(b.path()).unwrap());
    }
}
