//! # Client Configuration
//!
//! Settings for the lossless API client and the playback engine.
//!
//! The configuration uses a builder pattern with fail-fast validation:
//! [`ClientConfigBuilder::build`] refuses an empty instance list, malformed
//! instance URLs and nonsensical cache or retry settings, returning an
//! actionable [`Error::Config`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ClientConfig, load_instances};
//!
//! let instances = load_instances(include_str!("instances.json"))?;
//! let config = ClientConfig::builder()
//!     .instances(instances)
//!     .preferred_quality("LOSSLESS")
//!     .build()?;
//! ```
//!
//! ## instances.json
//!
//! Either an array of base URLs or an array of objects carrying a `url`
//! field. Order is preserved; it is the failover order.
//!
//! ```json
//! ["https://api-a.example.com", { "url": "https://api-b.example.com" }]
//! ```

use crate::error::{Error, Result};
use bridge_traits::http::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quality tokens accepted for `preferred_quality`, highest first.
pub const QUALITY_TOKENS: &[&str] = &["HI_RES_LOSSLESS", "LOSSLESS", "HIGH", "LOW"];

const MAX_CACHE_SIZE: usize = 10_000;
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Configuration for the API client and player.
///
/// Durations serialize as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Mirror base URLs in failover order, without trailing slash.
    pub instances: Vec<String>,

    /// Attempts per instance before falling through to the next one.
    pub retry_attempts: u32,

    /// Linear backoff base: the delay after attempt `n` is `n * base`.
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,

    /// Lifetime of cached API results.
    #[serde(with = "duration_ms")]
    pub cache_ttl: Duration,

    /// Entries kept per cache kind before the oldest is evicted.
    pub cache_max_size: usize,

    /// Entries kept in the stream URL cache.
    pub stream_cache_max_entries: usize,

    /// How often expired cache entries are pruned.
    #[serde(with = "duration_ms")]
    pub prune_interval: Duration,

    /// Past this position "previous" restarts the current track instead.
    #[serde(with = "duration_ms")]
    pub restart_threshold: Duration,

    /// Quality requested when none is given explicitly.
    pub preferred_quality: String,

    /// Per-request timeout handed to the HTTP bridge.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Optional proxy base replacing the cover-art host.
    pub cover_proxy_base: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            cache_ttl: Duration::from_secs(30 * 60),
            cache_max_size: 100,
            stream_cache_max_entries: 50,
            prune_interval: Duration::from_secs(5 * 60),
            restart_threshold: Duration::from_secs(3),
            preferred_quality: "LOSSLESS".to_string(),
            request_timeout: Duration::from_secs(15),
            cover_proxy_base: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Retry policy derived from the per-instance attempt settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_base_delay * self.retry_attempts.max(1),
        }
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - At least one instance, each an absolute http(s) URL
    /// - Retry attempts within `1..=10`
    /// - Cache sizes greater than zero and bounded
    /// - A known preferred quality token
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(Error::Config(
                "At least one API instance is required. \
                 Load them with `load_instances` or pass them to the builder."
                    .to_string(),
            ));
        }

        for instance in &self.instances {
            if !is_http_url(instance) {
                return Err(Error::Config(format!(
                    "Instance '{}' is not an absolute http(s) URL",
                    instance
                )));
            }
        }

        if self.retry_attempts == 0 || self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(Error::Config(format!(
                "Retry attempts must be between 1 and {}",
                MAX_RETRY_ATTEMPTS
            )));
        }

        if self.cache_max_size == 0 || self.cache_max_size > MAX_CACHE_SIZE {
            return Err(Error::Config(format!(
                "Cache max size must be between 1 and {}",
                MAX_CACHE_SIZE
            )));
        }

        if self.stream_cache_max_entries == 0 {
            return Err(Error::Config(
                "Stream cache must hold at least one entry".to_string(),
            ));
        }

        if self.cache_ttl.is_zero() {
            return Err(Error::Config("Cache TTL must be greater than 0".to_string()));
        }

        if self.prune_interval.is_zero() {
            return Err(Error::Config(
                "Prune interval must be greater than 0".to_string(),
            ));
        }

        if !QUALITY_TOKENS.contains(&self.preferred_quality.as_str()) {
            return Err(Error::Config(format!(
                "Unknown audio quality '{}'; expected one of {}",
                self.preferred_quality,
                QUALITY_TOKENS.join(", ")
            )));
        }

        if let Some(proxy) = &self.cover_proxy_base {
            if !is_http_url(proxy) {
                return Err(Error::Config(format!(
                    "Cover proxy base '{}' is not an absolute http(s) URL",
                    proxy
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`ClientConfig`]. Unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the instance list. Trailing slashes are trimmed, duplicates dropped.
    pub fn instances<I, S>(mut self, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.instances = normalize_instances(instances.into_iter().map(Into::into));
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        let mut all = std::mem::take(&mut self.config.instances);
        all.push(instance.into());
        self.config.instances = normalize_instances(all);
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn cache_max_size(mut self, size: usize) -> Self {
        self.config.cache_max_size = size;
        self
    }

    pub fn stream_cache_max_entries(mut self, entries: usize) -> Self {
        self.config.stream_cache_max_entries = entries;
        self
    }

    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.config.prune_interval = interval;
        self
    }

    pub fn restart_threshold(mut self, threshold: Duration) -> Self {
        self.config.restart_threshold = threshold;
        self
    }

    /// Quality token, case-insensitive (`"lossless"` becomes `"LOSSLESS"`).
    pub fn preferred_quality(mut self, quality: impl Into<String>) -> Self {
        self.config.preferred_quality = quality.into().to_uppercase();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn cover_proxy_base(mut self, base: impl Into<String>) -> Self {
        self.config.cover_proxy_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InstanceEntry {
    Url(String),
    Object { url: String },
}

/// Parse an `instances.json` document into an ordered instance list.
pub fn load_instances(json: &str) -> Result<Vec<String>> {
    let entries: Vec<InstanceEntry> = serde_json::from_str(json)
        .map_err(|e| Error::Config(format!("Invalid instances.json: {}", e)))?;

    let instances = normalize_instances(entries.into_iter().map(|entry| match entry {
        InstanceEntry::Url(url) => url,
        InstanceEntry::Object { url } => url,
    }));

    if instances.is_empty() {
        return Err(Error::Config("instances.json lists no instances".to_string()));
    }

    Ok(instances)
}

fn normalize_instances(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in raw {
        let url = url.trim().trim_end_matches('/').to_string();
        if !url.is_empty() && !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
