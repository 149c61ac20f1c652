//! Fallback reconstruction from previously cached records.
//!
//! When live resolution is impossible, any species whose image was ever
//! cached can be re-assembled into a complete record, provided *some*
//! cached regional catalog still carries its catalog entry. Expiry is
//! deliberately ignored throughout: something beats nothing.

use crate::cache::{CacheKey, CacheNamespace, TtlCache};
use crate::catalog::CatalogBird;
use crate::media::{AudioMedia, ImageMedia};

use super::{BirdInfo, CACHED_LOCATION};

/// Reconstructs previously-seen birds from cache fragments.
#[derive(Clone)]
pub struct CacheRecovery {
    cache: TtlCache,
}

impl CacheRecovery {
    pub fn new(cache: TtlCache) -> Self {
        Self { cache }
    }

    /// Attempts to synthesize one complete, previously-seen bird record.
    ///
    /// Picks a cached image uniformly at random, then searches every cached
    /// regional catalog (in sorted key order, so ties between regions
    /// resolve deterministically) for the matching catalog entry. Cached
    /// audio is attached opportunistically. Returns `None` when no image is
    /// cached, or the chosen image's species matches no cached catalog
    /// entry. A single failed attempt is not retried across other images.
    ///
    /// Never fabricates: a species without a full catalog match is never
    /// returned.
    pub async fn any_cached(&self) -> Option<BirdInfo> {
        let image_keys = self.cache.keys_in(CacheNamespace::Image).await;
        if image_keys.is_empty() {
            tracing::debug!("No cached images, reconstruction impossible");
            return None;
        }

        let chosen = &image_keys[rand::random_range(0..image_keys.len())];
        let species = chosen.species()?.clone();

        let image: ImageMedia = match self.cache.load_stale(chosen).await {
            Some(image) => image,
            None => {
                tracing::warn!("Cached image entry {chosen} unreadable, reconstruction failed");
                return None;
            }
        };

        // Regions are scanned in sorted key order; first match wins and the
        // original region attribution is lost.
        let mut catalog_keys = self.cache.keys_in(CacheNamespace::Catalog).await;
        catalog_keys.sort_by_key(CacheKey::storage_key);

        for catalog_key in &catalog_keys {
            let Some(birds) = self.cache.load_stale::<Vec<CatalogBird>>(catalog_key).await else {
                continue;
            };
            if let Some(bird) = birds.into_iter().find(|b| b.species_code == species) {
                let audio: Option<AudioMedia> = self
                    .cache
                    .load_stale(&CacheKey::Audio(species.clone()))
                    .await;

                tracing::info!(
                    "Reconstructed {} ({species}) from cache (audio: {})",
                    bird.common_name,
                    audio.is_some()
                );
                return Some(BirdInfo {
                    bird,
                    image,
                    audio,
                    location: CACHED_LOCATION.to_string(),
                    auto_play: false,
                });
            }
        }

        tracing::debug!("No cached catalog entry matches species {species}");
        None
    }
}
