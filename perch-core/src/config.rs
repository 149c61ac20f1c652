//! Centralized configuration for Perch.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Perch components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct PerchConfig {
    pub cache: CacheConfig,
    pub network: NetworkConfig,
    pub playback: PlaybackConfig,
}

/// Cache TTL classes and capacity.
///
/// Catalog lists and species media age independently; both are multi-day
/// because upstream data changes rarely and the cache doubles as the
/// offline fallback corpus.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for regional catalog lists
    pub catalog_ttl: Duration,
    /// Time-to-live for per-species image and audio entries
    pub media_ttl: Duration,
    /// Capacity of the in-memory cache layer
    pub memory_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_ttl: Duration::from_secs(3 * 24 * 3600), // 3 days
            media_ttl: Duration::from_secs(7 * 24 * 3600),   // 7 days
            memory_entries: 64,
        }
    }
}

/// Upstream endpoints and request-boundary timing.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Regional catalog API endpoint
    pub catalog_base_url: String,
    /// Media library search API endpoint
    pub media_base_url: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// Wall-clock bound on one full UI/engine exchange, retry included
    pub exchange_timeout: Duration,
    /// Fixed backoff before the single transient-channel retry
    pub retry_backoff: Duration,
    /// Spacing between successive media library requests in batch fetches
    pub media_fetch_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: "https://api.birdperch.app/v1/region-birds".to_string(),
            media_base_url: "https://search.macaulaylibrary.org/api/v1/search".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: "perch/0.1.0",
            exchange_timeout: Duration::from_secs(15),
            retry_backoff: Duration::from_secs(1),
            media_fetch_interval: Duration::from_millis(500),
        }
    }
}

/// Video playback lifecycle configuration.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Grace period between the tab going hidden and the video resource
    /// being released. Balances freeing decoder/network resources promptly
    /// against a jarring reload on a brief tab switch.
    pub unload_grace: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            unload_grace: Duration::from_secs(30),
        }
    }
}

impl PerchConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PERCH_CATALOG_URL") {
            config.network.catalog_base_url = url;
        }
        if let Ok(url) = std::env::var("PERCH_MEDIA_URL") {
            config.network.media_base_url = url;
        }
        if let Ok(timeout) = std::env::var("PERCH_REQUEST_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.network.request_timeout = Duration::from_secs(seconds);
            }
        }
        if let Ok(timeout) = std::env::var("PERCH_EXCHANGE_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.network.exchange_timeout = Duration::from_secs(seconds);
            }
        }
        if let Ok(ttl) = std::env::var("PERCH_CATALOG_TTL_DAYS") {
            if let Ok(days) = ttl.parse::<u64>() {
                config.cache.catalog_ttl = Duration::from_secs(days * 24 * 3600);
            }
        }
        if let Ok(ttl) = std::env::var("PERCH_MEDIA_TTL_DAYS") {
            if let Ok(days) = ttl.parse::<u64>() {
                config.cache.media_ttl = Duration::from_secs(days * 24 * 3600);
            }
        }
        if let Ok(grace) = std::env::var("PERCH_UNLOAD_GRACE_SECS") {
            if let Ok(seconds) = grace.parse::<u64>() {
                config.playback.unload_grace = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Creates a configuration with short timings suitable for tests.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.network.request_timeout = Duration::from_millis(500);
        config.network.exchange_timeout = Duration::from_secs(2);
        config.network.retry_backoff = Duration::from_millis(10);
        config.network.media_fetch_interval = Duration::from_millis(5);
        config.cache.memory_entries = 8;
        config
    }
}
