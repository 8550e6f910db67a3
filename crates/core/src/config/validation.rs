//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_html_bytes` is 0 or exceeds 50MB
    /// - `fetch_timeout_ms` is under 100ms or over 5 minutes
    /// - `max_redirects` exceeds 10
    /// - `cache_max_size` or `cache_ttl_sec` is 0
    /// - `render_concurrency` is 0 or exceeds 20
    /// - `score_threshold` is negative
    /// - SSR divisor/threshold values are non-positive
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_html_bytes == 0 {
            return Err(invalid("max_html_bytes", "must be greater than 0"));
        }
        if self.max_html_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_html_bytes", "must not exceed 50MB"));
        }

        if self.fetch_timeout_ms < 100 {
            return Err(invalid("fetch_timeout_ms", "must be at least 100ms"));
        }
        if self.fetch_timeout_ms > 300_000 {
            return Err(invalid("fetch_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_redirects > 10 {
            return Err(invalid("max_redirects", "must not exceed 10"));
        }

        if self.cache_max_size == 0 {
            return Err(invalid("cache_max_size", "must be greater than 0"));
        }
        if self.cache_ttl_sec == 0 {
            return Err(invalid("cache_ttl_sec", "must be greater than 0"));
        }

        if self.render_concurrency == 0 {
            return Err(invalid("render_concurrency", "must be greater than 0"));
        }
        if self.render_concurrency > 20 {
            return Err(invalid("render_concurrency", "must not exceed 20 concurrent renders"));
        }

        if self.score_threshold < 0.0 {
            return Err(invalid("score_threshold", "must be non-negative"));
        }
        if self.fallback_score_factor <= 0.0 {
            return Err(invalid("fallback_score_factor", "must be positive"));
        }

        if self.ssr.script_divisor == 0 {
            return Err(invalid("ssr.script_divisor", "must be greater than 0"));
        }
        if self.ssr.threshold <= 0.0 {
            return Err(invalid("ssr.threshold", "must be positive"));
        }
        if self.ssr.script_ratio_threshold <= 0.0 {
            return Err(invalid("ssr.script_ratio_threshold", "must be positive"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.allow_private_networks {
            tracing::warn!("allow_private_networks is set; SSRF address checks are disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_html_bytes_zero() {
        let config = AppConfig { max_html_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_html_bytes"));
    }

    #[test]
    fn test_validate_max_html_bytes_exceeds_limit() {
        let config = AppConfig { max_html_bytes: 51 * 1024 * 1024, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_html_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let too_small = AppConfig { fetch_timeout_ms: 50, ..Default::default() };
        assert!(matches!(too_small.validate(), Err(ConfigError::Invalid { field, .. }) if field == "fetch_timeout_ms"));

        let too_large = AppConfig { fetch_timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(too_large.validate(), Err(ConfigError::Invalid { field, .. }) if field == "fetch_timeout_ms"));
    }

    #[test]
    fn test_validate_redirect_cap() {
        let config = AppConfig { max_redirects: 11, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_redirects"));

        let zero_is_fine = AppConfig { max_redirects: 0, ..Default::default() };
        assert!(zero_is_fine.validate().is_ok());
    }

    #[test]
    fn test_validate_cache_values_must_be_positive() {
        let config = AppConfig { cache_max_size: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "cache_max_size"));

        let config = AppConfig { cache_ttl_sec: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_sec"));
    }

    #[test]
    fn test_validate_render_concurrency_bounds() {
        let config = AppConfig { render_concurrency: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "render_concurrency"));

        let config = AppConfig { render_concurrency: 21, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "render_concurrency"));
    }

    #[test]
    fn test_validate_negative_score_threshold() {
        let config = AppConfig { score_threshold: -1.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "score_threshold"));
    }

    #[test]
    fn test_validate_ssr_divisor() {
        let mut config = AppConfig::default();
        config.ssr.script_divisor = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "ssr.script_divisor"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            max_html_bytes: 1,
            fetch_timeout_ms: 100,
            max_redirects: 10,
            render_concurrency: 20,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
