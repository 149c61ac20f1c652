//! Bird resolution orchestration and engine state.

use std::sync::Arc;

use crate::cache::{CacheNamespace, KeyValueStore, RegionCode, SpeciesCode, TtlCache};
use crate::catalog::{CatalogBird, CatalogProvider, RegionCatalog};
use crate::config::PerchConfig;
use crate::media::{FetchPriority, MediaFetchQueue, MediaProvider, MediaResolver};

use super::prefetch::{PrefetchSlot, warm_media_bytes};
use super::recovery::CacheRecovery;
use super::{BirdInfo, EngineError};

/// The cloneable resolution pipeline: catalog → random pick → media join →
/// fallback. Shared between the live request path and prefetch warm tasks.
#[derive(Clone)]
pub struct BirdResolver {
    catalog: RegionCatalog,
    media: MediaResolver,
    recovery: CacheRecovery,
}

impl BirdResolver {
    pub fn new(catalog: RegionCatalog, media: MediaResolver, recovery: CacheRecovery) -> Self {
        Self {
            catalog,
            media,
            recovery,
        }
    }

    /// Resolves one bird for `region` through the full live path.
    ///
    /// Catalog failure and per-bird image failure both fall back to cache
    /// reconstruction; only when that too yields nothing does the terminal
    /// `NoCacheAvailable` surface. Audio failure never fails the attempt.
    ///
    /// # Errors
    ///
    /// - `EngineError::NoCacheAvailable` - No live data and nothing cached
    pub async fn resolve(
        &self,
        region: &RegionCode,
        auto_play: bool,
    ) -> Result<BirdInfo, EngineError> {
        let birds = match self.catalog.birds(region).await {
            Ok(birds) => birds,
            Err(e) => {
                tracing::warn!("Catalog resolution for {region} failed: {e}");
                return self.recover(region, auto_play).await;
            }
        };

        let bird = birds[rand::random_range(0..birds.len())].clone();
        tracing::debug!("Picked {} ({}) for {region}", bird.common_name, bird.species_code);

        let (image, audio) = tokio::join!(
            self.media.image(&bird.species_code),
            self.media.audio(&bird.species_code)
        );

        // No image means this bird cannot be shown; fall back to any cached
        // record rather than retrying a species with no cached media.
        let image = match image {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Image resolution for {} failed: {e}", bird.species_code);
                return self.recover(region, auto_play).await;
            }
        };

        let audio = match audio {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("Audio resolution for {} failed: {e}", bird.species_code);
                None
            }
        };

        Ok(BirdInfo {
            bird,
            image,
            audio,
            location: region.as_str().to_string(),
            auto_play,
        })
    }

    async fn recover(&self, region: &RegionCode, auto_play: bool) -> Result<BirdInfo, EngineError> {
        match self.recovery.any_cached().await {
            Some(mut info) => {
                info.auto_play = auto_play;
                Ok(info)
            }
            None => Err(EngineError::NoCacheAvailable {
                region: region.clone(),
            }),
        }
    }
}

/// Engine state owned by the actor task.
pub struct BirdEngine {
    cache: TtlCache,
    resolver: BirdResolver,
    prefetch: PrefetchSlot,
    fetch_queue: MediaFetchQueue,
    warm_client: reqwest::Client,
}

impl BirdEngine {
    /// Wires the engine from its collaborators.
    pub fn new(
        config: PerchConfig,
        store: Arc<dyn KeyValueStore>,
        catalog_provider: Arc<dyn CatalogProvider>,
        media_provider: Arc<dyn MediaProvider>,
    ) -> Self {
        let cache = TtlCache::new(store, config.cache.memory_entries);
        let catalog = RegionCatalog::new(catalog_provider, cache.clone(), config.cache.catalog_ttl);
        let media = MediaResolver::new(media_provider, cache.clone(), config.cache.media_ttl);
        let recovery = CacheRecovery::new(cache.clone());
        let fetch_queue =
            MediaFetchQueue::spawn(media.clone(), config.network.media_fetch_interval);

        let warm_client = reqwest::Client::builder()
            .timeout(config.network.request_timeout)
            .user_agent(config.network.user_agent)
            .build()
            .unwrap_or_default();

        Self {
            cache,
            resolver: BirdResolver::new(catalog, media, recovery),
            prefetch: PrefetchSlot::new(),
            fetch_queue,
            warm_client,
        }
    }

    /// Primary entry point: returns one bird for `region`.
    ///
    /// Serves the prefetched record when one is parked for this region
    /// (the sole elision of the normal resolution path) and always kicks
    /// off warming of the next record afterwards.
    ///
    /// # Errors
    ///
    /// - `EngineError::NoCacheAvailable` - No live data and nothing cached
    pub async fn bird_info(
        &mut self,
        region: RegionCode,
        auto_play: bool,
    ) -> Result<BirdInfo, EngineError> {
        if let Some(mut info) = self.prefetch.take(&region) {
            tracing::debug!("Serving prefetched bird {} for {region}", info.bird.species_code);
            info.auto_play = auto_play;
            self.spawn_warm_next(region);
            return Ok(info);
        }

        let info = self.resolver.resolve(&region, auto_play).await?;
        self.spawn_warm_next(region);
        Ok(info)
    }

    /// Returns the raw catalog list for `region`.
    ///
    /// # Errors
    ///
    /// - `EngineError::Catalog` - Fetch failed and nothing cached to serve
    pub async fn birds_by_region(
        &mut self,
        region: RegionCode,
    ) -> Result<Vec<CatalogBird>, EngineError> {
        Ok(self.resolver.catalog.birds(&region).await?)
    }

    /// Purges all three cache namespaces and the prefetch slot.
    ///
    /// # Errors
    ///
    /// - `EngineError::Store` - Backend delete failed
    pub async fn delete_cache(&mut self) -> Result<(), EngineError> {
        self.prefetch.invalidate();
        self.cache.purge(&CacheNamespace::all()).await?;
        tracing::info!("Cache deleted");
        Ok(())
    }

    /// Region setting changed: the cached corpus and any parked or in-flight
    /// prefetch are for the wrong region now.
    pub async fn region_changed(&mut self, region: RegionCode) {
        self.prefetch.invalidate();
        if let Err(e) = self.cache.purge(&CacheNamespace::all()).await {
            tracing::warn!("Cache purge on region change failed: {e}");
        }
        tracing::info!("Region changed to {region}, cache and prefetch cleared");
    }

    /// Queues species images for rate-limited background warm-up.
    pub fn prefetch_images(&mut self, species: Vec<SpeciesCode>) {
        tracing::debug!("Queueing {} species for image warm-up", species.len());
        self.fetch_queue.prefetch_images(species);
    }

    /// Queues one species ahead of all background warm-up items.
    pub fn prioritize_image(&mut self, species: SpeciesCode) {
        self.fetch_queue.enqueue(species, FetchPriority::Foreground);
    }

    /// Stops the background tasks the engine owns. Called when the actor
    /// loop ends, whatever ended it.
    pub fn stop_background_tasks(&mut self) {
        self.prefetch.invalidate();
        self.fetch_queue.shutdown();
    }

    /// Fire-and-forget: resolves the next bird for `region` and parks it in
    /// the prefetch slot, then warms its media bytes. A slot invalidation
    /// while the task is in flight discards the result at store time.
    fn spawn_warm_next(&self, region: RegionCode) {
        let resolver = self.resolver.clone();
        let slot = self.prefetch.clone();
        let client = self.warm_client.clone();
        let epoch = slot.epoch();

        tokio::spawn(async move {
            match resolver.resolve(&region, false).await {
                Ok(info) => {
                    if slot.store_if_current(region.clone(), epoch, info.clone()) {
                        warm_media_bytes(&client, &info).await;
                        tracing::debug!("Prefetched next bird for {region}");
                    } else {
                        tracing::debug!(
                            "Discarding prefetched bird for {region}: slot invalidated"
                        );
                    }
                }
                Err(e) => tracing::debug!("Prefetch for {region} failed: {e}"),
            }
        });
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn prefetch_slot(&self) -> &PrefetchSlot {
        &self.prefetch
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_mocks::{MockCatalogProvider, MockMediaProvider, test_bird};
    use super::*;
    use crate::cache::{CacheKey, MemoryKeyValueStore};
    use crate::media::ImageMedia;

    fn engine_with(
        catalog: MockCatalogProvider,
        media: MockMediaProvider,
    ) -> (BirdEngine, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let engine = BirdEngine::new(
            PerchConfig::for_testing(),
            store.clone(),
            Arc::new(catalog),
            Arc::new(media),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn test_live_resolution_composes_record() {
        let catalog = MockCatalogProvider::new().with_region(
            "US",
            vec![
                test_bird("amerob", "American Robin"),
                test_bird("norcar", "Northern Cardinal"),
                test_bird("bkcchi", "Black-capped Chickadee"),
            ],
        );
        let media = MockMediaProvider::new().with_full_media();
        let (mut engine, _) = engine_with(catalog, media);

        let info = engine
            .bird_info(RegionCode::new("US"), true)
            .await
            .unwrap();

        assert!(!info.image.image_url.is_empty());
        assert_eq!(info.location, "US");
        assert!(info.auto_play);
    }

    #[tokio::test]
    async fn test_dead_upstream_reconstructs_from_cache() {
        let catalog = MockCatalogProvider::new_failing();
        let media = MockMediaProvider::new();
        let (mut engine, _) = engine_with(catalog, media);

        // Seed the cache fragments the reconstructor needs: an image for
        // amerob and a catalog from a different region carrying it.
        engine
            .cache
            .store(
                &CacheKey::Image(crate::cache::SpeciesCode::new("amerob")),
                &ImageMedia {
                    image_url: "robin.jpg".to_string(),
                    photographer: "Jo Birder".to_string(),
                    photographer_url: String::new(),
                },
                std::time::Duration::from_secs(0),
            )
            .await
            .unwrap();
        engine
            .cache
            .store(
                &CacheKey::Catalog(RegionCode::new("CA")),
                &vec![test_bird("amerob", "American Robin")],
                std::time::Duration::from_secs(0),
            )
            .await
            .unwrap();

        let info = engine
            .bird_info(RegionCode::new("US"), false)
            .await
            .unwrap();

        assert_eq!(info.bird.common_name, "American Robin");
        assert_eq!(info.location, super::super::CACHED_LOCATION);
    }

    #[tokio::test]
    async fn test_nothing_cached_is_terminal() {
        let catalog = MockCatalogProvider::new_failing();
        let media = MockMediaProvider::new();
        let (mut engine, _) = engine_with(catalog, media);

        let result = engine.bird_info(RegionCode::new("US"), false).await;
        assert!(matches!(result, Err(EngineError::NoCacheAvailable { .. })));
        assert!(result.unwrap_err().is_offline());
    }

    #[tokio::test]
    async fn test_image_failure_falls_back_not_retries() {
        // Live catalog, but the media library has nothing for any species.
        let catalog = MockCatalogProvider::new()
            .with_region("US", vec![test_bird("amerob", "American Robin")]);
        let media = MockMediaProvider::new();
        let (mut engine, _) = engine_with(catalog, media);

        let result = engine.bird_info(RegionCode::new("US"), false).await;
        assert!(matches!(result, Err(EngineError::NoCacheAvailable { .. })));
    }

    #[tokio::test]
    async fn test_audio_failure_is_swallowed() {
        let catalog = MockCatalogProvider::new()
            .with_region("US", vec![test_bird("amerob", "American Robin")]);
        let media = MockMediaProvider::new().with_images_only();
        let (mut engine, _) = engine_with(catalog, media);

        let info = engine
            .bird_info(RegionCode::new("US"), false)
            .await
            .unwrap();

        assert_eq!(info.audio, None);
        assert!(!info.image.image_url.is_empty());
    }

    #[tokio::test]
    async fn test_delete_cache_clears_namespaces_and_slot() {
        let catalog = MockCatalogProvider::new()
            .with_region("US", vec![test_bird("amerob", "American Robin")]);
        let media = MockMediaProvider::new().with_full_media();
        let (mut engine, store) = engine_with(catalog, media);

        engine
            .bird_info(RegionCode::new("US"), false)
            .await
            .unwrap();
        assert!(!store.is_empty().await);

        // The warm task parks its record only after all its cache writes;
        // once the slot is occupied the purge cannot race a repopulation.
        while engine.prefetch.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        engine.delete_cache().await.unwrap();

        assert!(store.is_empty().await);
        assert!(engine.prefetch.is_empty());
    }
}
