// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero ceilings and sane backoff ordering.

use crate::diagnostic::ConfigError;
use crate::model::{ChannelLimits, CourierConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    validate_limits("rates.bridge", &config.rates.bridge, &mut errors);
    validate_limits("rates.cloud", &config.rates.cloud, &mut errors);

    if config.lock.max_consecutive_errors == 0 {
        errors.push(ConfigError::Validation {
            message: "lock.max_consecutive_errors must be at least 1".to_string(),
        });
    }

    if config.lock.stale_after_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "lock.stale_after_secs must be at least 1".to_string(),
        });
    }

    if config.dispatch.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.dispatch.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.max_attempts must be at least 1".to_string(),
        });
    }

    if config.dispatch.backoff_cap_secs < config.dispatch.backoff_base_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.backoff_cap_secs ({}) must not be below dispatch.backoff_base_secs ({})",
                config.dispatch.backoff_cap_secs, config.dispatch.backoff_base_secs
            ),
        });
    }

    if config.campaign.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "campaign.batch_size must be at least 1".to_string(),
        });
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "http.request_timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_limits(section: &str, limits: &ChannelLimits, errors: &mut Vec<ConfigError>) {
    if limits.per_minute == 0 {
        errors.push(ConfigError::Validation {
            message: format!("{section}.per_minute must be at least 1"),
        });
    }
    if limits.per_hour == 0 {
        errors.push(ConfigError::Validation {
            message: format!("{section}.per_hour must be at least 1"),
        });
    }
    if limits.per_hour < limits.per_minute {
        errors.push(ConfigError::Validation {
            message: format!(
                "{section}.per_hour ({}) must not be below {section}.per_minute ({})",
                limits.per_hour, limits.per_minute
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let mut config = CourierConfig::default();
        config.rates.bridge.per_minute = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("per_minute")));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let mut config = CourierConfig::default();
        config.dispatch.backoff_base_secs = 600;
        config.dispatch.backoff_cap_secs = 60;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn hourly_below_minute_ceiling_is_rejected() {
        let mut config = CourierConfig::default();
        config.rates.cloud.per_minute = 500;
        config.rates.cloud.per_hour = 100;
        assert!(validate_config(&config).is_err());
    }
}
