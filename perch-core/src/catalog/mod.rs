//! Regional bird catalog with cache-or-fetch and serve-stale fallback.

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, RegionCode, SpeciesCode, TtlCache};

pub use http::HttpCatalogProvider;

/// Errors from catalog resolution.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog API returned status {status} for region {region}")]
    UpstreamStatus { status: u16, region: RegionCode },

    #[error("Catalog API returned no birds for region {region}")]
    EmptyCatalog { region: RegionCode },

    #[error("Catalog request failed: {reason}")]
    Request { reason: String },

    #[error("Catalog response malformed: {reason}")]
    InvalidResponse { reason: String },
}

/// Localized common names, carried through verbatim when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cn: Option<String>,
}

/// One catalog entry. Immutable once fetched; owned by whichever regional
/// catalog entry last wrote it to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBird {
    pub species_code: SpeciesCode,
    pub common_name: String,
    #[serde(default)]
    pub localized_names: LocalizedNames,
    pub scientific_name: String,
    pub description: String,
    pub conservation_status: String,
}

/// Remote catalog API, an external collaborator.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetches the birds observable in `region`.
    ///
    /// # Errors
    ///
    /// - `CatalogError::UpstreamStatus` - Non-success HTTP status
    /// - `CatalogError::Request` - Transport failure
    /// - `CatalogError::InvalidResponse` - Unparseable body
    async fn birds_in_region(&self, region: &RegionCode) -> Result<Vec<CatalogBird>, CatalogError>;
}

/// Cache-or-fetch view over the regional catalog.
///
/// The one place the cache is deliberately read past expiry: when a live
/// fetch fails, a stale catalog is strictly better than none.
#[derive(Clone)]
pub struct RegionCatalog {
    provider: Arc<dyn CatalogProvider>,
    cache: TtlCache,
    ttl: Duration,
}

impl RegionCatalog {
    pub fn new(provider: Arc<dyn CatalogProvider>, cache: TtlCache, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Returns the birds for `region`, from cache when fresh, otherwise from
    /// the provider. An empty upstream list counts as a failure.
    ///
    /// # Errors
    ///
    /// - `CatalogError::EmptyCatalog` - Upstream returned zero birds and
    ///   nothing is cached for the region
    /// - Any provider error, when no cached list exists to serve stale
    pub async fn birds(&self, region: &RegionCode) -> Result<Vec<CatalogBird>, CatalogError> {
        let key = CacheKey::Catalog(region.clone());

        if let Some(birds) = self.cache.load::<Vec<CatalogBird>>(&key).await {
            tracing::debug!("Catalog for {region} served from cache ({} birds)", birds.len());
            return Ok(birds);
        }

        let fetch_error = match self.provider.birds_in_region(region).await {
            Ok(birds) if birds.is_empty() => CatalogError::EmptyCatalog {
                region: region.clone(),
            },
            Ok(birds) => {
                if let Err(e) = self.cache.store(&key, &birds, self.ttl).await {
                    tracing::warn!("Failed to cache catalog for {region}: {e}");
                }
                tracing::info!("Fetched catalog for {region}: {} birds", birds.len());
                return Ok(birds);
            }
            Err(e) => e,
        };

        // Serve stale before propagating: ignore TTL on this second read.
        if let Some(birds) = self.cache.load_stale::<Vec<CatalogBird>>(&key).await {
            tracing::warn!(
                "Catalog fetch for {region} failed ({fetch_error}), serving stale list of {} birds",
                birds.len()
            );
            return Ok(birds);
        }

        Err(fetch_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;
    use crate::cache::MemoryKeyValueStore;

    struct ScriptedProvider {
        birds: Vec<CatalogBird>,
        fail: AtomicBool,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(birds: Vec<CatalogBird>) -> Self {
            Self {
                birds,
                fail: AtomicBool::new(false),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for ScriptedProvider {
        async fn birds_in_region(
            &self,
            region: &RegionCode,
        ) -> Result<Vec<CatalogBird>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::Request {
                    reason: "connection refused".to_string(),
                });
            }
            let _ = region;
            Ok(self.birds.clone())
        }
    }

    fn bird(code: &str, name: &str) -> CatalogBird {
        CatalogBird {
            species_code: SpeciesCode::new(code),
            common_name: name.to_string(),
            localized_names: LocalizedNames::default(),
            scientific_name: format!("{name}us latinus"),
            description: format!("A {name}."),
            conservation_status: "LC".to_string(),
        }
    }

    fn new_cache() -> TtlCache {
        TtlCache::new(Arc::new(MemoryKeyValueStore::new()), 8)
    }

    #[tokio::test]
    async fn test_second_read_hits_cache() {
        let provider = Arc::new(ScriptedProvider::new(vec![bird("amerob", "American Robin")]));
        let catalog = RegionCatalog::new(provider.clone(), new_cache(), Duration::from_secs(60));
        let region = RegionCode::new("US");

        let first = catalog.birds(&region).await.unwrap();
        let second = catalog.birds(&region).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_serves_stale_on_fetch_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![bird("amerob", "American Robin")]));
        // Zero TTL: the cached list is expired immediately after write.
        let catalog = RegionCatalog::new(provider.clone(), new_cache(), Duration::from_secs(0));
        let region = RegionCode::new("US");

        let fetched = catalog.birds(&region).await.unwrap();
        provider.fail.store(true, Ordering::SeqCst);

        let stale = catalog.birds(&region).await.unwrap();
        assert_eq!(stale, fetched);
    }

    #[tokio::test]
    async fn test_failure_with_cold_cache_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.fail.store(true, Ordering::SeqCst);
        let catalog = RegionCatalog::new(provider, new_cache(), Duration::from_secs(60));

        let result = catalog.birds(&RegionCode::new("US")).await;
        assert!(matches!(result, Err(CatalogError::Request { .. })));
    }

    #[tokio::test]
    async fn test_empty_upstream_list_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let catalog = RegionCatalog::new(provider, new_cache(), Duration::from_secs(60));

        let result = catalog.birds(&RegionCode::new("US")).await;
        assert!(matches!(result, Err(CatalogError::EmptyCatalog { .. })));
    }
}
