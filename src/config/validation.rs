use crate::config::types::{
    Config, CrawlerConfig, DiscoveryConfig, OutputConfig, PlanLimits, SourceEntry, SweepConfig,
    UserAgentConfig,
};
use crate::model::PlanTier;
use crate::ConfigError;
use url::Url;

/// Upper bound on pull loops per worker
const MAX_CONCURRENCY: usize = 64;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_discovery_config(&config.discovery)?;
    for tier in PlanTier::ALL {
        validate_plan_limits(tier, config.plans.limits(tier))?;
    }
    validate_sweep_config(&config.sweep)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_CONCURRENCY).contains(&config.concurrency) {
        return Err(invalid(format!(
            "crawler.concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }
    if config.default_timeout_ms == 0 {
        return Err(invalid("crawler.default-timeout-ms must be > 0"));
    }
    if config.seen_capacity == 0 {
        return Err(invalid("crawler.seen-capacity must be >= 1"));
    }
    Ok(())
}

/// The agent name becomes the robots.txt product token, so it must be a
/// single token
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid(format!(
            "user-agent.crawler-name must be a non-empty token of letters, digits and hyphens, got '{}'",
            name
        )));
    }
    if config.crawler_version.trim().is_empty() {
        return Err(invalid("user-agent.crawler-version cannot be empty"));
    }

    let contact = Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("contact-url '{}': {}", config.contact_url, e)))?;
    if !matches!(contact.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "contact-url '{}' must use HTTP(S)",
            config.contact_url
        )));
    }

    validate_email(&config.contact_email)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(invalid("output.database-path cannot be empty"));
    }
    if config.report_path.trim().is_empty() {
        return Err(invalid("output.report-path cannot be empty"));
    }
    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.max_queries == 0 {
        return Err(invalid("discovery.max-queries must be >= 1"));
    }
    if config.pacing_min_ms > config.pacing_max_ms {
        return Err(invalid(format!(
            "discovery.pacing-min-ms ({}) exceeds pacing-max-ms ({})",
            config.pacing_min_ms, config.pacing_max_ms
        )));
    }
    config
        .denylist
        .iter()
        .try_for_each(|entry| validate_domain_pattern(entry))
}

fn validate_plan_limits(tier: PlanTier, limits: &PlanLimits) -> Result<(), ConfigError> {
    let problem = if !(limits.rate_per_sec.is_finite() && limits.rate_per_sec > 0.0) {
        Some("rate-per-sec must be a positive number")
    } else if limits.burst == 0 {
        Some("burst must be >= 1")
    } else if limits.max_parallel_searches == 0 {
        Some("max-parallel-searches must be >= 1")
    } else if limits.timeout_ms == 0 || limits.byte_budget == 0 {
        Some("timeout-ms and byte-budget must be > 0")
    } else if limits.excerpt_chars == Some(0) {
        Some("excerpt-chars must be > 0 when set")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(invalid(format!("plans.{}: {}", tier, problem))),
        None => Ok(()),
    }
}

fn validate_sweep_config(config: &SweepConfig) -> Result<(), ConfigError> {
    if config.interval_secs == 0 {
        return Err(invalid("sweep.interval-secs must be > 0"));
    }
    if !(0.0..1.0).contains(&config.jitter) {
        return Err(invalid(format!(
            "sweep.jitter must be in [0, 1), got {}",
            config.jitter
        )));
    }
    if !(0.0..=1.0).contains(&config.queued_estimate_factor) {
        return Err(invalid(format!(
            "sweep.queued-estimate-factor must be in [0, 1], got {}",
            config.queued_estimate_factor
        )));
    }
    if let Some(priority) = [config.discovery_priority, config.refresh_priority]
        .into_iter()
        .find(|p| !(1..=10).contains(p))
    {
        return Err(invalid(format!(
            "sweep priorities must be between 1 and 10, got {}",
            priority
        )));
    }
    Ok(())
}

fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut ids = std::collections::HashSet::new();

    for source in sources {
        if source.id.trim().is_empty() {
            return Err(invalid("source id cannot be empty"));
        }
        if !ids.insert(source.id.as_str()) {
            return Err(invalid(format!("duplicate source id '{}'", source.id)));
        }
        if !(0.0..=1.0).contains(&source.relevance) {
            return Err(invalid(format!(
                "source '{}' relevance must be in [0, 1], got {}",
                source.id, source.relevance
            )));
        }
        if source.max_per_minute == Some(0) {
            return Err(invalid(format!(
                "source '{}' max-per-minute must be >= 1 when set",
                source.id
            )));
        }

        for raw in &source.urls {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!("source '{}' URL '{}': {}", source.id, raw, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(format!(
                    "source '{}' URL '{}' must use HTTP(S)",
                    source.id, raw
                )));
            }
        }
    }

    Ok(())
}

/// A denylist entry: `host.tld` or `*.host.tld`
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    let reject = |why: &str| {
        Err(ConfigError::InvalidPattern(format!(
            "denylist entry '{}' {}",
            pattern, why
        )))
    };

    if domain.is_empty() {
        return reject("is empty");
    }
    if !domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        return reject("contains invalid characters");
    }
    if !domain.contains('.') {
        return reject("needs a dot, e.g. 'uline.com'");
    }
    if domain
        .split('.')
        .any(|label| label.is_empty() || label.starts_with('-') || label.ends_with('-'))
    {
        return reject("has an empty or hyphen-edged label");
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ConfigError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(invalid(format!(
            "user-agent.contact-email '{}' is not a valid address",
            email
        )))
    }
}
