//! Offline and degraded-mode behavior: serve-stale, reconstruction, and
//! persistence across an engine restart.

use std::sync::Arc;
use std::time::Duration;

use perch_core::cache::{
    CacheKey, JsonFileStore, MemoryKeyValueStore, RegionCode, SpeciesCode, TtlCache,
};
use perch_core::config::PerchConfig;
use perch_core::engine::test_mocks::{MockCatalogProvider, MockMediaProvider, test_bird};
use perch_core::engine::{EngineError, spawn_bird_engine};
use perch_core::media::ImageMedia;

fn robin_image() -> ImageMedia {
    ImageMedia {
        image_url: "https://cdn.example/amerob.jpg".to_string(),
        photographer: "Jo Birder".to_string(),
        photographer_url: String::new(),
    }
}

/// Seeds the fragments reconstruction needs: an image for `amerob` and a
/// `birds_CA` catalog carrying it. Entries are written already expired to
/// prove fallback ignores TTL.
async fn seed_fragments(store: Arc<MemoryKeyValueStore>) -> anyhow::Result<()> {
    let cache = TtlCache::new(store, 8);
    cache
        .store(
            &CacheKey::Image(SpeciesCode::new("amerob")),
            &robin_image(),
            Duration::from_secs(0),
        )
        .await?;
    cache
        .store(
            &CacheKey::Catalog(RegionCode::new("CA")),
            &vec![test_bird("amerob", "American Robin")],
            Duration::from_secs(0),
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_dead_upstream_reconstructs_from_other_region() -> anyhow::Result<()> {
    let store = Arc::new(MemoryKeyValueStore::new());
    seed_fragments(store.clone()).await?;

    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        store,
        Arc::new(MockCatalogProvider::new_failing()),
        Arc::new(MockMediaProvider::new()),
    );

    let info = handle.bird_info(RegionCode::new("US"), false).await?;

    assert_eq!(info.bird.common_name, "American Robin");
    assert_eq!(info.location, "Cached");
    assert_eq!(info.image.image_url, "https://cdn.example/amerob.jpg");
    Ok(())
}

#[tokio::test]
async fn test_nothing_cached_is_the_terminal_offline_error() {
    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(MockCatalogProvider::new_failing()),
        Arc::new(MockMediaProvider::new()),
    );

    let result = handle.bird_info(RegionCode::new("US"), false).await;

    match result {
        Err(e @ EngineError::NoCacheAvailable { .. }) => assert!(e.is_offline()),
        other => panic!("expected NoCacheAvailable, got {other:?}"),
    }
}

/// Provider whose upstream can be killed mid-test.
struct ToggleCatalogProvider {
    birds: Vec<perch_core::CatalogBird>,
    dead: std::sync::atomic::AtomicBool,
}

#[async_trait::async_trait]
impl perch_core::catalog::CatalogProvider for ToggleCatalogProvider {
    async fn birds_in_region(
        &self,
        _region: &RegionCode,
    ) -> Result<Vec<perch_core::CatalogBird>, perch_core::CatalogError> {
        if self.dead.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(perch_core::CatalogError::Request {
                reason: "simulated outage".to_string(),
            });
        }
        Ok(self.birds.clone())
    }
}

#[tokio::test]
async fn test_catalog_served_stale_after_upstream_dies() -> anyhow::Result<()> {
    let provider = Arc::new(ToggleCatalogProvider {
        birds: vec![test_bird("amerob", "American Robin")],
        dead: std::sync::atomic::AtomicBool::new(false),
    });
    let cache = TtlCache::new(Arc::new(MemoryKeyValueStore::new()), 8);
    // TTL of zero: the cached list is expired the moment it is written.
    let catalog = perch_core::RegionCatalog::new(provider.clone(), cache, Duration::from_secs(0));
    let region = RegionCode::new("US");

    let fresh = catalog.birds(&region).await?;
    provider.dead.store(true, std::sync::atomic::Ordering::SeqCst);

    // Fetch fails, list is past its TTL, and it is still served verbatim.
    let stale = catalog.birds(&region).await?;
    assert_eq!(fresh, stale);
    Ok(())
}

#[tokio::test]
async fn test_cache_survives_engine_restart() -> anyhow::Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let path = temp_dir.path().join("perch-cache.json");

    // First life: live upstream, populate the persistent cache.
    {
        let store = Arc::new(JsonFileStore::open(&path).await?);
        let catalog = MockCatalogProvider::new()
            .with_region("US", vec![test_bird("amerob", "American Robin")]);
        let media = MockMediaProvider::new().with_full_media();
        let handle = spawn_bird_engine(
            PerchConfig::for_testing(),
            store,
            Arc::new(catalog),
            Arc::new(media),
        );
        let info = handle.bird_info(RegionCode::new("US"), false).await?;
        assert_eq!(info.location, "US");
        handle.shutdown().await?;
    }

    // Second life: upstream dead, served entirely from the reopened file.
    let store = Arc::new(JsonFileStore::open(&path).await?);
    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        store,
        Arc::new(MockCatalogProvider::new_failing()),
        Arc::new(MockMediaProvider::new()),
    );

    let info = handle.bird_info(RegionCode::new("US"), false).await?;
    assert_eq!(info.bird.common_name, "American Robin");
    assert_eq!(info.location, "Cached");
    Ok(())
}
