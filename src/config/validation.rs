//! Semantic configuration checks.
//!
//! Serde handles the syntactic layer; this module rejects configurations
//! that deserialize fine but cannot work at runtime.

use regex::Regex;

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Validate a deserialized configuration.
pub fn validate(config: &RelayConfig) -> Result<(), RelayError> {
    for pattern in &config.filter.ignored_patterns {
        Regex::new(pattern).map_err(|e| {
            RelayError::Config(format!("ignored_patterns entry {pattern:?} does not compile: {e}"))
        })?;
    }

    if config.delivery.timeout_ms == 0 {
        return Err(RelayError::Config(
            "delivery.timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.discovery.join_timeout_ms == 0 {
        return Err(RelayError::Config(
            "discovery.join_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if let Some(base_url) = &config.delivery.base_url {
        if base_url.trim().is_empty() {
            return Err(RelayError::Config(
                "delivery.base_url must not be blank; omit it for discovery-only operation"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn rejects_broken_pattern() {
        let mut config = RelayConfig::default();
        config.filter.ignored_patterns.push("GET [".to_string());
        assert!(matches!(validate(&config), Err(RelayError::Config(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = RelayConfig::default();
        config.delivery.timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_blank_base_url() {
        let mut config = RelayConfig::default();
        config.delivery.base_url = Some("   ".to_string());
        assert!(validate(&config).is_err());
    }
}
