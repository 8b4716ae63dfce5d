use std::collections::HashSet;

use super::{
    types::{Config, ProviderKind},
    ConfigError,
};

/// Longest accepted cache TTL, one hundred years.
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 100;

/// Validate configuration.
///
/// Rejects a zero port, zero retry or concurrency limits, a zero breaker
/// threshold, a cache TTL above `MAX_TTL_HOURS`, and provider lists with
/// empty or duplicate names, missing adapter settings, or no enabled entry.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.queue.max_retries == 0 {
        return Err(invalid("queue.max_retries must be at least 1"));
    }
    if config.queue.max_concurrent_jobs == 0 {
        return Err(invalid("queue.max_concurrent_jobs must be at least 1"));
    }
    if config.breaker.failure_threshold == 0 {
        return Err(invalid("breaker.failure_threshold must be at least 1"));
    }
    if config.aggregator.max_concurrent_providers == 0 {
        return Err(invalid("aggregator.max_concurrent_providers must be at least 1"));
    }
    if config.cache.ttl_hours > MAX_TTL_HOURS {
        return Err(ConfigError::ValidationError(format!(
            "cache.ttl_hours cannot exceed {MAX_TTL_HOURS}"
        )));
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(invalid("providers[].name cannot be empty"));
        }
        if !seen.insert(provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        match provider.kind {
            ProviderKind::Jackett => {
                let Some(jackett) = &provider.jackett else {
                    return Err(ConfigError::ValidationError(format!(
                        "provider '{}' has kind 'jackett' but no [providers.jackett] section",
                        provider.name
                    )));
                };
                if jackett.url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "provider '{}' has an empty jackett.url",
                        provider.name
                    )));
                }
            }
        }
    }

    if !config.providers.is_empty() && !config.providers.iter().any(|p| p.enabled) {
        return Err(invalid("at least one provider must be enabled"));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
