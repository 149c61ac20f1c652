//! Actor implementation for the bird engine.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cache::KeyValueStore;
use crate::catalog::CatalogProvider;
use crate::config::PerchConfig;
use crate::media::MediaProvider;

use super::commands::BirdEngineCommand;
use super::core::BirdEngine;
use super::handle::BirdEngineHandle;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Spawns the bird engine actor and returns its handle.
///
/// The actor processes commands sequentially, so engine state needs no
/// locks; concurrency lives in the tasks the engine itself spawns
/// (prefetch warm-up, batch media fetches).
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use std::sync::Arc;
///
/// use perch_core::cache::MemoryKeyValueStore;
/// use perch_core::catalog::HttpCatalogProvider;
/// use perch_core::config::PerchConfig;
/// use perch_core::engine::spawn_bird_engine;
/// use perch_core::media::HttpMediaProvider;
///
/// let config = PerchConfig::from_env();
/// let store = Arc::new(MemoryKeyValueStore::new());
/// let catalog = Arc::new(HttpCatalogProvider::new(&config.network).unwrap());
/// let media = Arc::new(HttpMediaProvider::new(&config.network).unwrap());
/// let handle = spawn_bird_engine(config, store, catalog, media);
/// # }
/// ```
pub fn spawn_bird_engine(
    config: PerchConfig,
    store: Arc<dyn KeyValueStore>,
    catalog_provider: Arc<dyn CatalogProvider>,
    media_provider: Arc<dyn MediaProvider>,
) -> BirdEngineHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let exchange_timeout = config.network.exchange_timeout;
    let retry_backoff = config.network.retry_backoff;

    let engine = BirdEngine::new(config, store, catalog_provider, media_provider);

    tokio::spawn(async move {
        run_actor_loop(engine, receiver).await;
    });

    BirdEngineHandle::new(sender, exchange_timeout, retry_backoff)
}

/// Runs the main actor message processing loop until the channel closes or
/// a shutdown command arrives.
async fn run_actor_loop(mut engine: BirdEngine, mut receiver: mpsc::Receiver<BirdEngineCommand>) {
    tracing::debug!("Bird engine actor started");

    while let Some(command) = receiver.recv().await {
        if !handle_command(&mut engine, command).await {
            break;
        }
    }

    // Whether stopped by Shutdown or by every handle being dropped, the
    // worker tasks the engine owns must end with it.
    engine.stop_background_tasks();
    tracing::debug!("Bird engine actor stopped");
}

/// Handles a single command. Returns true to continue processing, false to
/// shut down.
async fn handle_command(engine: &mut BirdEngine, command: BirdEngineCommand) -> bool {
    match command {
        BirdEngineCommand::GetBirdInfo {
            region,
            auto_play,
            responder,
        } => {
            let result = engine.bird_info(region, auto_play).await;
            responder.send(result).ok();
        }
        BirdEngineCommand::GetBirdsByRegion { region, responder } => {
            let result = engine.birds_by_region(region).await;
            responder.send(result).ok();
        }
        BirdEngineCommand::DeleteCache { responder } => {
            let result = engine.delete_cache().await;
            responder.send(result).ok();
        }
        BirdEngineCommand::PrefetchImages { species } => {
            engine.prefetch_images(species);
        }
        BirdEngineCommand::RegionChanged { region } => {
            engine.region_changed(region).await;
        }
        BirdEngineCommand::Shutdown { responder } => {
            responder.send(()).ok();
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::super::EngineError;
    use super::super::test_mocks::{MockCatalogProvider, MockMediaProvider, test_bird};
    use super::*;
    use crate::cache::{MemoryKeyValueStore, RegionCode};

    fn spawn_test_engine() -> BirdEngineHandle {
        let catalog = MockCatalogProvider::new()
            .with_region("US", vec![test_bird("amerob", "American Robin")]);
        let media = MockMediaProvider::new().with_full_media();
        spawn_bird_engine(
            PerchConfig::for_testing(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(catalog),
            Arc::new(media),
        )
    }

    #[tokio::test]
    async fn test_round_trip_through_actor() {
        let handle = spawn_test_engine();

        let info = handle
            .bird_info(RegionCode::new("US"), true)
            .await
            .unwrap();
        assert_eq!(info.location, "US");

        let birds = handle.birds_by_region(RegionCode::new("US")).await.unwrap();
        assert_eq!(birds.len(), 1);

        handle.delete_cache().await.unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail_closed() {
        let handle = spawn_test_engine();
        handle.shutdown().await.unwrap();

        // Give the actor task time to drop the receiver.
        tokio::task::yield_now().await;

        let result = handle.delete_cache().await;
        assert!(matches!(
            result,
            Err(EngineError::ChannelClosed { .. }) | Err(EngineError::Timeout { .. })
        ));
    }
}
