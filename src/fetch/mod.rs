//! HTTP JSON fetching with an optional on-disk cache.
//!
//! Upstream bodies are fetched as text and decoded into typed responses.
//! When caching is enabled, successful bodies are stored under the cache
//! directory and served from disk while fresh.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::retry::Retryable;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Content too large: {size} bytes (max {max_size})")]
    ContentTooLarge { size: usize, max_size: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Retryable for FetchError {
    /// An explicit "not found" is final; every other failure may be transient.
    fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotFound(_) | FetchError::InvalidUrl(_))
    }
}

/// Metadata stored alongside cached content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub content_length: usize,
    pub expires_at: Option<DateTime<Utc>>,
}

/// On-disk cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Directory for cached bodies
    pub dir: PathBuf,

    /// How long cached content is considered fresh
    pub ttl: Duration,
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Cache settings; `None` always fetches live
    pub cache: Option<CacheSettings>,

    /// Maximum body size to accept (default 10MB)
    pub max_content_size: usize,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache: None,
            max_content_size: 10 * 1024 * 1024,
            timeout: Duration::from_secs(60),
            user_agent: format!("aoe2-overlay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP fetcher for JSON endpoints.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("aoe2-overlay")),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }

    /// Fetch a URL and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a URL as text, using the cache if enabled and fresh.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let Some(cache) = &self.config.cache else {
            return self.fetch_live(url).await;
        };

        let cache_path = Self::cache_path_for_url(&cache.dir, url);
        let meta_path = Self::meta_path_for_url(&cache.dir, url);

        if let Some(body) = self.check_cache(url, cache, &cache_path, &meta_path).await? {
            return Ok(body);
        }

        let body = self.fetch_live(url).await?;
        if let Err(e) = Self::write_cache(url, cache, &cache_path, &meta_path, &body).await {
            warn!("Could not cache {}: {}", url, e);
        }
        Ok(body)
    }

    /// Return a cached body if present and fresh.
    async fn check_cache(
        &self,
        url: &Url,
        cache: &CacheSettings,
        cache_path: &Path,
        meta_path: &Path,
    ) -> Result<Option<String>, FetchError> {
        if !cache_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let meta_content = fs::read_to_string(meta_path).await?;
        let meta: CacheMetadata = match serde_json::from_str(&meta_content) {
            Ok(m) => m,
            Err(_) => return Ok(None),
        };

        let age = Utc::now().signed_duration_since(meta.fetched_at);
        if age.num_seconds() > cache.ttl.as_secs() as i64 {
            debug!("Cache expired for {}", url);
            return Ok(None);
        }

        debug!("Serving {} from cache", url);
        Ok(Some(fs::read_to_string(cache_path).await?))
    }

    /// Fetch from the network.
    async fn fetch_live(&self, url: &Url) -> Result<String, FetchError> {
        info!("Fetching {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        if body.len() > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge {
                size: body.len(),
                max_size: self.config.max_content_size,
            });
        }

        Ok(body)
    }

    async fn write_cache(
        url: &Url,
        cache: &CacheSettings,
        cache_path: &Path,
        meta_path: &Path,
        body: &str,
    ) -> Result<(), FetchError> {
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(cache_path, body).await?;

        let fetched_at = Utc::now();
        let meta = CacheMetadata {
            url: url.to_string(),
            fetched_at,
            content_length: body.len(),
            expires_at: Some(fetched_at + chrono::Duration::seconds(cache.ttl.as_secs() as i64)),
        };
        fs::write(meta_path, serde_json::to_string_pretty(&meta)?).await?;
        Ok(())
    }

    /// Generate a cache path for a URL.
    fn cache_path_for_url(dir: &Path, url: &Url) -> PathBuf {
        let host = url.host_str().unwrap_or("unknown");
        dir.join(host).join(format!("{}.json", Self::url_hash(url)))
    }

    /// Generate a metadata path for a URL.
    fn meta_path_for_url(dir: &Path, url: &Url) -> PathBuf {
        let host = url.host_str().unwrap_or("unknown");
        dir.join(host)
            .join(format!("{}.meta.json", Self::url_hash(url)))
    }

    /// Hash a URL to a short string.
    fn url_hash(url: &Url) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_str().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}
