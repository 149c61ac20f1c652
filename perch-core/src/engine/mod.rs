//! Bird discovery engine: orchestration, fallback recovery, prefetch, and
//! the actor boundary the UI talks to.
//!
//! The engine runs as a single actor processing commands sequentially; the
//! handle side adds the bounded retry and overall exchange timeout that make
//! the UI boundary resilient to a restarting background process.

pub mod actor;
pub mod commands;
pub mod core;
pub mod handle;
pub mod prefetch;
pub mod recovery;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{RegionCode, StoreError};
use crate::catalog::{CatalogBird, CatalogError};
use crate::media::{AudioMedia, ImageMedia, MediaError};

pub use actor::spawn_bird_engine;
pub use commands::BirdEngineCommand;
pub use core::BirdEngine;
pub use handle::BirdEngineHandle;
pub use prefetch::PrefetchSlot;
pub use recovery::CacheRecovery;

/// `location` label attached to reconstructed records, whose region
/// attribution was lost.
pub const CACHED_LOCATION: &str = "Cached";

/// The deliverable: one catalog bird merged with its media, a location
/// label, and the caller's autoplay preference.
///
/// Created fresh per request and never persisted as a unit; its parts live
/// in separate cache namespaces, which is why reconstruction exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdInfo {
    pub bird: CatalogBird,
    pub image: ImageMedia,
    pub audio: Option<AudioMedia>,
    /// Region code of the request, or [`CACHED_LOCATION`] after fallback
    /// reconstruction. Only region-level granularity survives upstream.
    pub location: String,
    pub auto_play: bool,
}

/// Errors crossing the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Terminal: no live data and no usable cached record of any kind.
    /// The UI renders a distinct offline state for this one.
    #[error("No live data and no cached bird available for region {region}")]
    NoCacheAvailable { region: RegionCode },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// The command channel to the engine dropped and the single retry also
    /// failed.
    #[error("Engine channel closed during {operation}")]
    ChannelClosed { operation: &'static str },

    /// The whole exchange, retry included, exceeded its wall-clock bound.
    #[error("Engine {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl EngineError {
    /// True for the terminal nothing-to-show condition the UI renders a
    /// dedicated offline state for.
    pub fn is_offline(&self) -> bool {
        matches!(self, EngineError::NoCacheAvailable { .. })
    }
}
