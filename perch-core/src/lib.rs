//! Perch Core - Bird discovery, caching, and playback lifecycle
//!
//! This crate provides the engine behind a bird-per-new-tab client: a
//! regional catalog with TTL caching and serve-stale fallback, per-species
//! media resolution, offline reconstruction from cache fragments, next-bird
//! prefetching, and the visibility-driven video playback lifecycle.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod media;
pub mod playback;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cache::{
    CacheKey, CacheNamespace, JsonFileStore, KeyValueStore, MemoryKeyValueStore, RegionCode,
    SpeciesCode, StoreError, TtlCache,
};
pub use catalog::{CatalogBird, CatalogError, HttpCatalogProvider, RegionCatalog};
pub use config::PerchConfig;
pub use engine::{BirdEngineHandle, BirdInfo, EngineError, spawn_bird_engine};
pub use media::{AudioMedia, HttpMediaProvider, ImageMedia, MediaError, MediaResolver};
pub use playback::{VideoLifecycleHandle, VideoPhase, VideoSurface, spawn_video_lifecycle};

/// Core errors that can bubble up from any Perch subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PerchError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PerchError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            PerchError::Engine(e) => match e {
                EngineError::NoCacheAvailable { .. } => {
                    "You're offline and no birds are cached yet".to_string()
                }
                EngineError::Timeout { .. } => "The bird took too long to load".to_string(),
                _ => "Could not load a bird right now".to_string(),
            },
            PerchError::Catalog(_) => "Could not load the bird catalog".to_string(),
            PerchError::Media(_) => "Could not load bird photos or sounds".to_string(),
            PerchError::Store(_) => "Cache storage error occurred".to_string(),
            PerchError::Configuration { reason } => format!("Configuration error: {reason}"),
            PerchError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// True for the terminal offline condition the UI renders a dedicated
    /// state for, distinct from generic errors.
    pub fn is_offline(&self) -> bool {
        matches!(self, PerchError::Engine(e) if e.is_offline())
    }
}

pub type Result<T> = std::result::Result<T, PerchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_is_distinct_from_generic_errors() {
        let offline = PerchError::Engine(EngineError::NoCacheAvailable {
            region: RegionCode::new("US"),
        });
        let timeout = PerchError::Engine(EngineError::Timeout {
            operation: "get_bird_info",
            timeout: std::time::Duration::from_secs(15),
        });

        assert!(offline.is_offline());
        assert!(!timeout.is_offline());
        assert_ne!(offline.user_message(), timeout.user_message());
    }
}
