//! Command definitions for the bird engine actor model.

use tokio::sync::oneshot;

use crate::cache::{RegionCode, SpeciesCode};
use crate::catalog::CatalogBird;

use super::{BirdInfo, EngineError};

/// Commands that can be sent to the bird engine actor.
///
/// Each request/response command carries a response channel for the actor to
/// send back results; notification commands carry none and are
/// fire-and-forget. This message-passing approach eliminates shared-state
/// locks between the UI boundary and the engine.
pub enum BirdEngineCommand {
    /// Resolve one bird for a region.
    GetBirdInfo {
        region: RegionCode,
        auto_play: bool,
        responder: oneshot::Sender<Result<BirdInfo, EngineError>>,
    },
    /// Fetch the raw catalog list for a region.
    GetBirdsByRegion {
        region: RegionCode,
        responder: oneshot::Sender<Result<Vec<CatalogBird>, EngineError>>,
    },
    /// Purge all bird cache namespaces and the prefetch slot.
    DeleteCache {
        responder: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Queue species images for rate-limited background warm-up.
    PrefetchImages { species: Vec<SpeciesCode> },
    /// The effective region setting changed: clear cache and prefetch.
    RegionChanged { region: RegionCode },
    /// Shutdown the engine actor gracefully.
    Shutdown { responder: oneshot::Sender<()> },
}
