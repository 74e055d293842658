//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::{CacheSettings, FetcherConfig};
use crate::pipeline::{ListerLimits, PipelineSettings};
use crate::retry::RetryPolicy;
use crate::upstream::DEFAULT_API_BASE;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upstream service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_companion_base_url")]
    pub companion_base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Language code passed to the analysis endpoint
    #[serde(default = "default_analysis_language")]
    pub analysis_language: String,
}

fn default_companion_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_user_agent() -> String {
    format!("aoe2-overlay/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    60
}

fn default_analysis_language() -> String {
    "es".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            companion_base_url: default_companion_base_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            analysis_language: default_analysis_language(),
        }
    }
}

/// On-disk response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./storage/match_analysis")
}

fn default_cache_ttl() -> u64 {
    24 * 60 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_cache_dir(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Retry policy for analysis fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// 1.0 keeps the delay fixed
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_delay_ms() -> u64 {
    300
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Pipeline defaults and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_leaderboard")]
    pub leaderboard: String,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default = "default_ongoing_per_page")]
    pub ongoing_per_page: u32,

    #[serde(default = "default_pages")]
    pub pages: u32,

    #[serde(default = "default_max_search_pages")]
    pub max_search_pages: u32,

    #[serde(default = "default_civ_target_matches")]
    pub civ_target_matches: usize,

    /// In-flight analysis fetches; 1 is strictly serial
    #[serde(default = "default_analysis_concurrency")]
    pub analysis_concurrency: usize,

    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_seconds: u64,

    #[serde(default = "default_min_civ_plays")]
    pub min_civ_plays_for_percent: u32,
}

fn default_leaderboard() -> String {
    "rm_1v1".to_string()
}

fn default_per_page() -> u32 {
    10
}

fn default_ongoing_per_page() -> u32 {
    11
}

fn default_pages() -> u32 {
    1
}

fn default_max_search_pages() -> u32 {
    10
}

fn default_civ_target_matches() -> usize {
    5
}

fn default_analysis_concurrency() -> usize {
    1
}

fn default_overall_timeout() -> u64 {
    1800
}

fn default_min_civ_plays() -> u32 {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            leaderboard: default_leaderboard(),
            per_page: default_per_page(),
            ongoing_per_page: default_ongoing_per_page(),
            pages: default_pages(),
            max_search_pages: default_max_search_pages(),
            civ_target_matches: default_civ_target_matches(),
            analysis_concurrency: default_analysis_concurrency(),
            overall_timeout_seconds: default_overall_timeout(),
            min_civ_plays_for_percent: default_min_civ_plays(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream timeout must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }

        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigError::ValidationError(
                "Retry backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.pipeline.per_page == 0 || self.pipeline.ongoing_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_search_pages == 0 {
            return Err(ConfigError::ValidationError(
                "max_search_pages must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.analysis_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "analysis_concurrency must be at least 1".to_string(),
            ));
        }

        if self.pipeline.overall_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Overall timeout must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// HTTP fetcher settings.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            cache: self.cache.enabled.then(|| CacheSettings {
                dir: self.cache.dir.clone(),
                ttl: Duration::from_secs(self.cache.ttl_seconds),
            }),
            timeout: Duration::from_secs(self.upstream.timeout_seconds),
            user_agent: self.upstream.user_agent.clone(),
            ..FetcherConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay_ms: self.retry.initial_delay_ms,
            backoff_multiplier: self.retry.backoff_multiplier,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let p = &self.pipeline;
        PipelineSettings {
            leaderboard: p.leaderboard.clone(),
            per_page: p.per_page,
            ongoing_per_page: p.ongoing_per_page,
            pages: p.pages,
            limits: ListerLimits {
                max_search_pages: p.max_search_pages,
                civ_target_matches: p.civ_target_matches,
            },
            analysis_concurrency: p.analysis_concurrency,
            overall_timeout: Duration::from_secs(p.overall_timeout_seconds),
            min_civ_plays: p.min_civ_plays_for_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.upstream.companion_base_url, DEFAULT_API_BASE);
        assert_eq!(config.upstream.analysis_language, "es");
        assert!(!config.cache.enabled);
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.pipeline.per_page, 10);
        assert_eq!(config.pipeline.ongoing_per_page, 11);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_defaults_match_pipeline_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline_settings(), PipelineSettings::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_retry() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\nanalysis_concurrency = 4\n\n[cache]\nenabled = true\nttl_seconds = 60"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.analysis_concurrency, 4);
        assert_eq!(config.pipeline.pages, 1);

        let fetcher = config.fetcher_config();
        let cache = fetcher.cache.unwrap();
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.dir, PathBuf::from("./storage/match_analysis"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.leaderboard, "rm_1v1");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.cache.dir, parsed.cache.dir);
    }
}
