//! Handle for communicating with the bird engine actor.
//!
//! The background process hosting the actor may restart mid-flight, so every
//! request/response exchange gets exactly one retry, only for transient
//! channel loss, never for data errors, which already travelled the channel
//! successfully. The whole exchange is bounded by a wall-clock timeout.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::cache::{RegionCode, SpeciesCode};
use crate::catalog::CatalogBird;

use super::commands::BirdEngineCommand;
use super::{BirdInfo, EngineError};

/// The channel to the actor dropped before a response arrived.
struct ChannelLost;

/// Handle for communicating with the bird engine actor.
///
/// Can be cloned and shared; clones talk to the same actor.
#[derive(Clone)]
pub struct BirdEngineHandle {
    sender: mpsc::Sender<BirdEngineCommand>,
    exchange_timeout: Duration,
    retry_backoff: Duration,
}

impl BirdEngineHandle {
    /// Creates a new handle with the given command sender and timing bounds.
    pub fn new(
        sender: mpsc::Sender<BirdEngineCommand>,
        exchange_timeout: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            sender,
            exchange_timeout,
            retry_backoff,
        }
    }

    /// Resolves one bird for `region`.
    ///
    /// # Errors
    /// - `EngineError::NoCacheAvailable` - Offline with nothing cached
    /// - `EngineError::ChannelClosed` - Actor unreachable after the retry
    /// - `EngineError::Timeout` - Exchange exceeded its wall-clock bound
    pub async fn bird_info(
        &self,
        region: RegionCode,
        auto_play: bool,
    ) -> Result<BirdInfo, EngineError> {
        self.exchange("get_bird_info", |responder| BirdEngineCommand::GetBirdInfo {
            region: region.clone(),
            auto_play,
            responder,
        })
        .await?
    }

    /// Fetches the catalog list for `region`.
    ///
    /// # Errors
    /// - `EngineError::Catalog` - Fetch failed and nothing cached
    /// - `EngineError::ChannelClosed` - Actor unreachable after the retry
    /// - `EngineError::Timeout` - Exchange exceeded its wall-clock bound
    pub async fn birds_by_region(
        &self,
        region: RegionCode,
    ) -> Result<Vec<CatalogBird>, EngineError> {
        self.exchange("get_birds_by_region", |responder| {
            BirdEngineCommand::GetBirdsByRegion {
                region: region.clone(),
                responder,
            }
        })
        .await?
    }

    /// Purges all bird cache namespaces and the prefetch slot.
    ///
    /// # Errors
    /// - `EngineError::Store` - Backend delete failed
    /// - `EngineError::ChannelClosed` - Actor unreachable after the retry
    /// - `EngineError::Timeout` - Exchange exceeded its wall-clock bound
    pub async fn delete_cache(&self) -> Result<(), EngineError> {
        self.exchange("delete_cache", |responder| BirdEngineCommand::DeleteCache {
            responder,
        })
        .await?
    }

    /// Notifies the engine that the effective region changed. Fire-and-
    /// forget: a lost notification resolves itself on the next request.
    pub async fn region_changed(&self, region: RegionCode) {
        let command = BirdEngineCommand::RegionChanged {
            region: region.clone(),
        };
        if self.sender.send(command).await.is_err() {
            tracing::debug!("Region change notification for {region} dropped: engine gone");
        }
    }

    /// Queues species images for background warm-up. Fire-and-forget.
    pub async fn prefetch_images(&self, species: Vec<SpeciesCode>) {
        if self
            .sender
            .send(BirdEngineCommand::PrefetchImages { species })
            .await
            .is_err()
        {
            tracing::debug!("Prefetch request dropped: engine gone");
        }
    }

    /// Shuts the actor down gracefully.
    ///
    /// # Errors
    /// - `EngineError::ChannelClosed` - Actor already gone
    /// - `EngineError::Timeout` - Shutdown did not complete in time
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.exchange("shutdown", |responder| BirdEngineCommand::Shutdown { responder })
            .await
    }

    /// Runs one request/response exchange under the overall timeout, with
    /// the single transient-channel retry inside it. `R` is the responder
    /// payload; data errors inside `R` are returned as-is with zero retries.
    async fn exchange<R>(
        &self,
        operation: &'static str,
        make_command: impl Fn(oneshot::Sender<R>) -> BirdEngineCommand,
    ) -> Result<R, EngineError> {
        let exchange = self.exchange_with_retry(operation, &make_command);
        match tokio::time::timeout(self.exchange_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation,
                timeout: self.exchange_timeout,
            }),
        }
    }

    async fn exchange_with_retry<R>(
        &self,
        operation: &'static str,
        make_command: &impl Fn(oneshot::Sender<R>) -> BirdEngineCommand,
    ) -> Result<R, EngineError> {
        match self.try_exchange(make_command).await {
            Ok(response) => Ok(response),
            Err(ChannelLost) => {
                tracing::warn!("Channel lost during {operation}, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.try_exchange(make_command)
                    .await
                    .map_err(|ChannelLost| EngineError::ChannelClosed { operation })
            }
        }
    }

    async fn try_exchange<R>(
        &self,
        make_command: &impl Fn(oneshot::Sender<R>) -> BirdEngineCommand,
    ) -> Result<R, ChannelLost> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(make_command(responder))
            .await
            .map_err(|_| ChannelLost)?;
        receiver.await.map_err(|_| ChannelLost)
    }
}
