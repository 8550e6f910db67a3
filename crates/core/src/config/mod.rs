//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (READGATE_*)
//! 2. TOML config file (if READGATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// SSR detector weights. Positive weights push toward rendering;
/// `noscript_content` is subtracted, since substantial noscript fallback
/// text signals a page that degrades gracefully without JavaScript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsrWeights {
    #[serde(default = "default_weight_small_size")]
    pub small_size: f64,
    #[serde(default = "default_weight_high_script_ratio")]
    pub high_script_ratio: f64,
    #[serde(default = "default_weight_framework_markers")]
    pub framework_markers: f64,
    #[serde(default = "default_weight_spa_structure")]
    pub spa_structure: f64,
    #[serde(default = "default_weight_noscript_content")]
    pub noscript_content: f64,
}

fn default_weight_small_size() -> f64 {
    3.0
}

fn default_weight_high_script_ratio() -> f64 {
    2.0
}

fn default_weight_framework_markers() -> f64 {
    4.0
}

fn default_weight_spa_structure() -> f64 {
    2.5
}

fn default_weight_noscript_content() -> f64 {
    2.0
}

impl Default for SsrWeights {
    fn default() -> Self {
        Self {
            small_size: default_weight_small_size(),
            high_script_ratio: default_weight_high_script_ratio(),
            framework_markers: default_weight_framework_markers(),
            spa_structure: default_weight_spa_structure(),
            noscript_content: default_weight_noscript_content(),
        }
    }
}

/// SSR detector tunables. The detector is a heuristic; false positives and
/// negatives are corrected here, not in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsrConfig {
    /// Summed-signal score at or above which rendering is requested.
    #[serde(default = "default_ssr_threshold")]
    pub threshold: f64,

    /// Pages smaller than this many bytes count as "small".
    #[serde(default = "default_ssr_html_size_threshold")]
    pub html_size_threshold: usize,

    /// Executable-script tags per `script_divisor` bytes above which the
    /// page counts as script-heavy.
    #[serde(default = "default_ssr_script_ratio_threshold")]
    pub script_ratio_threshold: f64,

    /// Byte divisor for the script density computation.
    #[serde(default = "default_ssr_script_divisor")]
    pub script_divisor: usize,

    /// Minimum `<noscript>` text length considered substantial.
    #[serde(default = "default_ssr_noscript_min_len")]
    pub noscript_min_len: usize,

    #[serde(default)]
    pub weights: SsrWeights,
}

fn default_ssr_threshold() -> f64 {
    4.0
}

fn default_ssr_html_size_threshold() -> usize {
    5000
}

fn default_ssr_script_ratio_threshold() -> f64 {
    0.1
}

fn default_ssr_script_divisor() -> usize {
    1000
}

fn default_ssr_noscript_min_len() -> usize {
    50
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            threshold: default_ssr_threshold(),
            html_size_threshold: default_ssr_html_size_threshold(),
            script_ratio_threshold: default_ssr_script_ratio_threshold(),
            script_divisor: default_ssr_script_divisor(),
            noscript_min_len: default_ssr_noscript_min_len(),
            weights: SsrWeights::default(),
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (READGATE_*)
/// 2. TOML config file (if READGATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-Agent string for outbound HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Outbound page-fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Maximum HTML bytes accepted per fetch; the transfer is aborted once
    /// this budget is exceeded.
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,

    /// Maximum redirect hops followed per fetch.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Ports that outbound URLs may never target (internal service ports).
    #[serde(default = "default_blocked_ports")]
    pub blocked_ports: Vec<u16>,

    /// Whether a total DNS resolution failure passes the SSRF guard.
    /// Deny by default; flip only in operating modes where transient
    /// resolver failures must not block legitimate remote URLs.
    #[serde(default)]
    pub allow_dns_failure: bool,

    /// DNS resolution timeout in milliseconds.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Dev/test escape hatch: skip private-address checks in the SSRF
    /// guard. Scheme, credential, and port validation still apply.
    #[serde(default)]
    pub allow_private_networks: bool,

    /// Result cache capacity (entries).
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Result cache TTL in seconds.
    #[serde(default = "default_cache_ttl_sec")]
    pub cache_ttl_sec: u64,

    /// Extraction score at or above which the primary engine's result is
    /// accepted without fallback.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Scale factor for the locally computed fallback score.
    #[serde(default = "default_fallback_score_factor")]
    pub fallback_score_factor: f64,

    /// Base URL of the headless rendering worker.
    #[serde(default = "default_renderer_endpoint")]
    pub renderer_endpoint: String,

    /// Base URL of the extraction service.
    #[serde(default = "default_extractor_endpoint")]
    pub extractor_endpoint: String,

    /// Render request timeout in milliseconds.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Extraction service request timeout in milliseconds.
    #[serde(default = "default_extract_timeout_ms")]
    pub extract_timeout_ms: u64,

    /// Maximum concurrent renders. Each render holds a full browser
    /// context upstream, so this is bounded independently of request
    /// concurrency.
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,

    /// SSR detector tunables.
    #[serde(default)]
    pub ssr: SsrConfig,

    /// Minimum spacing between Reddit JSON requests in milliseconds.
    #[serde(default = "default_reddit_min_interval_ms")]
    pub reddit_min_interval_ms: u64,

    /// Top-level comments included per Reddit thread.
    #[serde(default = "default_reddit_top_level_limit")]
    pub reddit_top_level_limit: usize,

    /// Replies included per top-level Reddit comment.
    #[serde(default = "default_reddit_replies_per_top_limit")]
    pub reddit_replies_per_top_limit: usize,

    /// Client-side Stack Exchange API budget, requests per minute.
    #[serde(default = "default_stackoverflow_max_rpm")]
    pub stackoverflow_max_rpm: usize,

    /// Answers included per Stack Overflow question.
    #[serde(default = "default_stackoverflow_top_answers")]
    pub stackoverflow_top_answers: usize,

    /// Optional Stack Exchange API key for a higher quota.
    #[serde(default)]
    pub stackexchange_key: Option<String>,
}

fn default_user_agent() -> String {
    "readgate/0.1".into()
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_max_html_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_blocked_ports() -> Vec<u16> {
    vec![22, 3306, 5432, 6379, 9200, 27017]
}

fn default_dns_timeout_ms() -> u64 {
    5_000
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cache_ttl_sec() -> u64 {
    86_400
}

fn default_score_threshold() -> f64 {
    50.0
}

fn default_fallback_score_factor() -> f64 {
    0.8
}

fn default_renderer_endpoint() -> String {
    "http://renderer:3000".into()
}

fn default_extractor_endpoint() -> String {
    "http://extractor:8000".into()
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_extract_timeout_ms() -> u64 {
    30_000
}

fn default_render_concurrency() -> usize {
    5
}

fn default_reddit_min_interval_ms() -> u64 {
    600
}

fn default_reddit_top_level_limit() -> usize {
    20
}

fn default_reddit_replies_per_top_limit() -> usize {
    5
}

fn default_stackoverflow_max_rpm() -> usize {
    10
}

fn default_stackoverflow_top_answers() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_html_bytes: default_max_html_bytes(),
            max_redirects: default_max_redirects(),
            blocked_ports: default_blocked_ports(),
            allow_dns_failure: false,
            dns_timeout_ms: default_dns_timeout_ms(),
            allow_private_networks: false,
            cache_max_size: default_cache_max_size(),
            cache_ttl_sec: default_cache_ttl_sec(),
            score_threshold: default_score_threshold(),
            fallback_score_factor: default_fallback_score_factor(),
            renderer_endpoint: default_renderer_endpoint(),
            extractor_endpoint: default_extractor_endpoint(),
            render_timeout_ms: default_render_timeout_ms(),
            extract_timeout_ms: default_extract_timeout_ms(),
            render_concurrency: default_render_concurrency(),
            ssr: SsrConfig::default(),
            reddit_min_interval_ms: default_reddit_min_interval_ms(),
            reddit_top_level_limit: default_reddit_top_level_limit(),
            reddit_replies_per_top_limit: default_reddit_replies_per_top_limit(),
            stackoverflow_max_rpm: default_stackoverflow_max_rpm(),
            stackoverflow_top_answers: default_stackoverflow_top_answers(),
            stackexchange_key: None,
        }
    }
}

impl AppConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.extract_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }

    pub fn reddit_min_interval(&self) -> Duration {
        Duration::from_millis(self.reddit_min_interval_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `READGATE_`
    /// 2. TOML file from `READGATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("READGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("READGATE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
