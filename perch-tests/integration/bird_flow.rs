//! End-to-end resolution flow through the engine actor.

use std::sync::Arc;

use perch_core::cache::{MemoryKeyValueStore, RegionCode, SpeciesCode};
use perch_core::config::PerchConfig;
use perch_core::engine::test_mocks::{MockCatalogProvider, MockMediaProvider, test_bird};
use perch_core::engine::{BirdEngineHandle, spawn_bird_engine};

fn live_engine() -> BirdEngineHandle {
    let catalog = MockCatalogProvider::new().with_region(
        "US",
        vec![
            test_bird("amerob", "American Robin"),
            test_bird("norcar", "Northern Cardinal"),
            test_bird("bkcchi", "Black-capped Chickadee"),
        ],
    );
    let media = MockMediaProvider::new().with_full_media();

    spawn_bird_engine(
        PerchConfig::for_testing(),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(catalog),
        Arc::new(media),
    )
}

#[tokio::test]
async fn test_live_resolution_returns_complete_record() -> anyhow::Result<()> {
    let handle = live_engine();

    let info = handle.bird_info(RegionCode::new("US"), true).await?;

    assert!(!info.image.image_url.is_empty());
    assert!(info.audio.is_some());
    assert_eq!(info.location, "US");
    assert!(info.auto_play);
    assert!(!info.bird.common_name.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_repeated_requests_keep_serving() -> anyhow::Result<()> {
    let handle = live_engine();
    let region = RegionCode::new("US");

    // Second and later requests may come from the prefetch slot; every one
    // of them must still be a complete record for the right region.
    for _ in 0..5 {
        let info = handle.bird_info(region.clone(), false).await?;
        assert_eq!(info.location, "US");
        assert!(!info.image.image_url.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_region_change_invalidates_prefetch() -> anyhow::Result<()> {
    let catalog = MockCatalogProvider::new()
        .with_region("US", vec![test_bird("amerob", "American Robin")])
        .with_region("CA", vec![test_bird("cangoo", "Canada Goose")]);
    let media = MockMediaProvider::new().with_full_media();
    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(catalog),
        Arc::new(media),
    );

    // Seed the prefetch slot with a US bird.
    handle.bird_info(RegionCode::new("US"), false).await?;

    handle.region_changed(RegionCode::new("CA")).await;

    // The next record must be Canadian: a stale-region prefetch would have
    // produced the robin.
    let info = handle.bird_info(RegionCode::new("CA"), false).await?;
    assert_eq!(info.bird.species_code.as_str(), "cangoo");
    assert_eq!(info.location, "CA");
    Ok(())
}

#[tokio::test]
async fn test_birds_by_region_lists_catalog() -> anyhow::Result<()> {
    let handle = live_engine();

    let birds = handle.birds_by_region(RegionCode::new("US")).await?;

    assert_eq!(birds.len(), 3);
    assert!(birds.iter().any(|b| b.species_code.as_str() == "amerob"));
    Ok(())
}

#[tokio::test]
async fn test_delete_cache_forces_refetch() -> anyhow::Result<()> {
    let catalog = Arc::new(
        MockCatalogProvider::new().with_region("US", vec![test_bird("amerob", "American Robin")]),
    );
    let media = MockMediaProvider::new().with_full_media();
    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        Arc::new(MemoryKeyValueStore::new()),
        catalog.clone(),
        Arc::new(media),
    );

    handle.birds_by_region(RegionCode::new("US")).await?;
    handle.birds_by_region(RegionCode::new("US")).await?;
    // Cached: a single upstream fetch for both requests.
    assert_eq!(catalog.call_count(), 1);

    handle.delete_cache().await?;

    handle.birds_by_region(RegionCode::new("US")).await?;
    assert_eq!(catalog.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_prefetch_images_warms_media_cache() -> anyhow::Result<()> {
    let media = Arc::new(MockMediaProvider::new().with_full_media());
    let catalog = MockCatalogProvider::new();
    let handle = spawn_bird_engine(
        PerchConfig::for_testing(),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(catalog),
        media.clone(),
    );

    handle
        .prefetch_images(vec![SpeciesCode::new("amerob"), SpeciesCode::new("norcar")])
        .await;

    // The queue worker spaces requests by the configured interval.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while media.call_count() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "warm-up never ran");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    Ok(())
}
