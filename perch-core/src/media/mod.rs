//! Per-species media resolution against a third-party media library.
//!
//! Photos are mandatory content: a species without a usable image fails the
//! attempt. Recordings are optional; their absence is an ordinary outcome.

pub mod fetch_queue;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, SpeciesCode, TtlCache};

pub use fetch_queue::{FetchPriority, MediaFetchQueue};
pub use http::HttpMediaProvider;

/// Errors from media resolution.
///
/// `NoResults` and `MissingMediaUrl` are distinguished for diagnostics:
/// the first means the library has never seen the species, the second that
/// it has a record but no usable asset URL.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media library has no {kind} results for species {species}")]
    NoResults { species: SpeciesCode, kind: MediaKind },

    #[error("Media library result for species {species} has no usable media URL")]
    MissingMediaUrl { species: SpeciesCode },

    #[error("Media library returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Media request failed: {reason}")]
    Request { reason: String },

    #[error("Media response malformed: {reason}")]
    InvalidResponse { reason: String },
}

/// Asset class requested from the media library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Audio,
}

impl MediaKind {
    /// Value of the `mediaType` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query())
    }
}

/// Raw first-result data from the library: asset URL (possibly absent) plus
/// contributor attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub media_url: Option<String>,
    pub contributor: String,
    pub contributor_url: String,
}

/// A resolved photo with attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMedia {
    pub image_url: String,
    pub photographer: String,
    pub photographer_url: String,
}

/// A resolved recording with attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMedia {
    pub audio_url: String,
    pub recordist: String,
    pub recordist_url: String,
}

/// Media library search API, an external collaborator.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Returns the library's first result for the species, `None` when the
    /// library has no results at all.
    ///
    /// # Errors
    ///
    /// - `MediaError::UpstreamStatus` - Non-success HTTP status
    /// - `MediaError::Request` - Transport failure
    /// - `MediaError::InvalidResponse` - Unparseable body
    async fn search(
        &self,
        species: &SpeciesCode,
        kind: MediaKind,
    ) -> Result<Option<MediaRecord>, MediaError>;
}

/// Cache-or-fetch media resolution for a single species.
#[derive(Clone)]
pub struct MediaResolver {
    provider: Arc<dyn MediaProvider>,
    cache: TtlCache,
    ttl: Duration,
}

impl MediaResolver {
    pub fn new(provider: Arc<dyn MediaProvider>, cache: TtlCache, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Resolves the photo for a species, cached under `image_<code>`.
    ///
    /// # Errors
    ///
    /// - `MediaError::NoResults` - Library has nothing for the species
    /// - `MediaError::MissingMediaUrl` - Result present but unusable
    /// - Any transport or parse error from the provider
    pub async fn image(&self, species: &SpeciesCode) -> Result<ImageMedia, MediaError> {
        let key = CacheKey::Image(species.clone());

        if let Some(image) = self.cache.load::<ImageMedia>(&key).await {
            tracing::debug!("Image for {species} served from cache");
            return Ok(image);
        }

        let record = self
            .provider
            .search(species, MediaKind::Photo)
            .await?
            .ok_or_else(|| MediaError::NoResults {
                species: species.clone(),
                kind: MediaKind::Photo,
            })?;

        let image_url = record.media_url.ok_or_else(|| MediaError::MissingMediaUrl {
            species: species.clone(),
        })?;

        let image = ImageMedia {
            image_url,
            photographer: record.contributor,
            photographer_url: record.contributor_url,
        };

        if let Err(e) = self.cache.store(&key, &image, self.ttl).await {
            tracing::warn!("Failed to cache image for {species}: {e}");
        }
        Ok(image)
    }

    /// Resolves the recording for a species, cached under `audio_<code>`
    /// when one exists. Absence is a valid, non-error outcome; only
    /// transport-level failures error.
    pub async fn audio(&self, species: &SpeciesCode) -> Result<Option<AudioMedia>, MediaError> {
        let key = CacheKey::Audio(species.clone());

        if let Some(audio) = self.cache.load::<AudioMedia>(&key).await {
            tracing::debug!("Audio for {species} served from cache");
            return Ok(Some(audio));
        }

        let record = match self.provider.search(species, MediaKind::Audio).await? {
            Some(record) => record,
            None => {
                tracing::debug!("No recordings for {species}");
                return Ok(None);
            }
        };

        let Some(audio_url) = record.media_url else {
            tracing::debug!("Recording result for {species} has no asset URL");
            return Ok(None);
        };

        let audio = AudioMedia {
            audio_url,
            recordist: record.contributor,
            recordist_url: record.contributor_url,
        };

        if let Err(e) = self.cache.store(&key, &audio, self.ttl).await {
            tracing::warn!("Failed to cache audio for {species}: {e}");
        }
        Ok(Some(audio))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::cache::MemoryKeyValueStore;

    #[derive(Default)]
    struct TableProvider {
        records: HashMap<(String, &'static str), MediaRecord>,
        calls: AtomicU32,
    }

    impl TableProvider {
        fn with(mut self, species: &str, kind: MediaKind, url: Option<&str>) -> Self {
            self.records.insert(
                (species.to_string(), kind.as_query()),
                MediaRecord {
                    media_url: url.map(str::to_string),
                    contributor: "Jo Birder".to_string(),
                    contributor_url: "https://library.example/profile/jo".to_string(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl MediaProvider for TableProvider {
        async fn search(
            &self,
            species: &SpeciesCode,
            kind: MediaKind,
        ) -> Result<Option<MediaRecord>, MediaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .get(&(species.as_str().to_string(), kind.as_query()))
                .cloned())
        }
    }

    fn resolver(provider: TableProvider) -> (MediaResolver, Arc<TableProvider>) {
        let provider = Arc::new(provider);
        let cache = TtlCache::new(Arc::new(MemoryKeyValueStore::new()), 8);
        (
            MediaResolver::new(provider.clone(), cache, Duration::from_secs(60)),
            provider,
        )
    }

    #[tokio::test]
    async fn test_image_resolves_and_caches() {
        let (resolver, provider) = resolver(
            TableProvider::default().with("amerob", MediaKind::Photo, Some("robin.jpg")),
        );
        let species = SpeciesCode::new("amerob");

        let first = resolver.image(&species).await.unwrap();
        let second = resolver.image(&species).await.unwrap();

        assert_eq!(first.image_url, "robin.jpg");
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_image_zero_results_is_no_results() {
        let (resolver, _) = resolver(TableProvider::default());
        let result = resolver.image(&SpeciesCode::new("amerob")).await;
        assert!(matches!(result, Err(MediaError::NoResults { .. })));
    }

    #[tokio::test]
    async fn test_image_result_without_url_is_missing_url() {
        let (resolver, _) =
            resolver(TableProvider::default().with("amerob", MediaKind::Photo, None));
        let result = resolver.image(&SpeciesCode::new("amerob")).await;
        assert!(matches!(result, Err(MediaError::MissingMediaUrl { .. })));
    }

    #[tokio::test]
    async fn test_audio_absence_is_not_an_error() {
        let (resolver, _) = resolver(TableProvider::default());
        let audio = resolver.audio(&SpeciesCode::new("amerob")).await.unwrap();
        assert_eq!(audio, None);
    }

    #[tokio::test]
    async fn test_audio_without_url_is_absent() {
        let (resolver, _) =
            resolver(TableProvider::default().with("amerob", MediaKind::Audio, None));
        let audio = resolver.audio(&SpeciesCode::new("amerob")).await.unwrap();
        assert_eq!(audio, None);
    }

    #[tokio::test]
    async fn test_audio_resolves_and_caches() {
        let (resolver, provider) = resolver(
            TableProvider::default().with("amerob", MediaKind::Audio, Some("robin.mp3")),
        );
        let species = SpeciesCode::new("amerob");

        let first = resolver.audio(&species).await.unwrap().unwrap();
        resolver.audio(&species).await.unwrap();

        assert_eq!(first.audio_url, "robin.mp3");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
