//! Mock collaborators for testing the bird engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::cache::{RegionCode, SpeciesCode};
use crate::catalog::{CatalogBird, CatalogError, CatalogProvider, LocalizedNames};
use crate::media::{
    AudioMedia, ImageMedia, MediaError, MediaKind, MediaProvider, MediaRecord,
};

use super::BirdInfo;

/// Builds a minimal catalog bird for tests.
pub fn test_bird(code: &str, name: &str) -> CatalogBird {
    CatalogBird {
        species_code: SpeciesCode::new(code),
        common_name: name.to_string(),
        localized_names: LocalizedNames::default(),
        scientific_name: format!("{name} scientificus"),
        description: format!("The {name} is a test bird."),
        conservation_status: "LC".to_string(),
    }
}

/// Builds a complete deliverable record for tests.
pub fn test_bird_info(code: &str) -> BirdInfo {
    BirdInfo {
        bird: test_bird(code, code),
        image: ImageMedia {
            image_url: format!("https://cdn.example/{code}.jpg"),
            photographer: "Jo Birder".to_string(),
            photographer_url: String::new(),
        },
        audio: Some(AudioMedia {
            audio_url: format!("https://cdn.example/{code}.mp3"),
            recordist: "Jo Birder".to_string(),
            recordist_url: String::new(),
        }),
        location: "US".to_string(),
        auto_play: false,
    }
}

/// Mock catalog provider serving fixed per-region lists.
#[derive(Default)]
pub struct MockCatalogProvider {
    regions: HashMap<RegionCode, Vec<CatalogBird>>,
    fail: bool,
    calls: AtomicU32,
}

impl MockCatalogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider whose every fetch fails, simulating a dead
    /// upstream.
    pub fn new_failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Adds a region's bird list.
    pub fn with_region(mut self, region: &str, birds: Vec<CatalogBird>) -> Self {
        self.regions.insert(RegionCode::new(region), birds);
        self
    }

    /// Number of fetches attempted so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for MockCatalogProvider {
    async fn birds_in_region(&self, region: &RegionCode) -> Result<Vec<CatalogBird>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CatalogError::Request {
                reason: "simulated upstream outage".to_string(),
            });
        }
        Ok(self.regions.get(region).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum MediaMode {
    /// No results for anything.
    Empty,
    /// Photos and recordings for every species.
    Full,
    /// Photos resolve, recording searches fail at the transport level.
    ImagesOnly,
}

/// Mock media provider with a fixed behavior for every species.
pub struct MockMediaProvider {
    mode: MediaMode,
    calls: AtomicU32,
}

impl MockMediaProvider {
    /// Creates a provider with no results for any species.
    pub fn new() -> Self {
        Self {
            mode: MediaMode::Empty,
            calls: AtomicU32::new(0),
        }
    }

    /// Every species gets both a photo and a recording.
    pub fn with_full_media(mut self) -> Self {
        self.mode = MediaMode::Full;
        self
    }

    /// Photos resolve; recording searches fail, exercising the
    /// audio-failure-is-swallowed path.
    pub fn with_images_only(mut self) -> Self {
        self.mode = MediaMode::ImagesOnly;
        self
    }

    /// Number of searches attempted so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockMediaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProvider for MockMediaProvider {
    async fn search(
        &self,
        species: &SpeciesCode,
        kind: MediaKind,
    ) -> Result<Option<MediaRecord>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let extension = match kind {
            MediaKind::Photo => "jpg",
            MediaKind::Audio => "mp3",
        };

        match (self.mode, kind) {
            (MediaMode::Empty, _) => Ok(None),
            (MediaMode::ImagesOnly, MediaKind::Audio) => Err(MediaError::Request {
                reason: "simulated recording outage".to_string(),
            }),
            _ => Ok(Some(MediaRecord {
                media_url: Some(format!("https://cdn.example/{species}.{extension}")),
                contributor: "Jo Birder".to_string(),
                contributor_url: format!("https://library.example/profile/{species}"),
            })),
        }
    }
}
