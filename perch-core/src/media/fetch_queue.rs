//! Rate-limited batch fetch queue for species media.
//!
//! The media library enforces usage limits, so batch resolution (warming a
//! whole quiz round, for example) is serialized with a fixed delay between
//! requests. Two priority lanes: foreground items (the species a caller
//! needs right now) always jump ahead of background warm-up items.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::MediaResolver;
use crate::cache::SpeciesCode;

/// Lane a queued species lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPriority {
    /// Needed now; served before any background item.
    Foreground,
    /// Opportunistic warm-up; served when the foreground lane is empty.
    Background,
}

#[derive(Default)]
struct QueueState {
    foreground: VecDeque<SpeciesCode>,
    background: VecDeque<SpeciesCode>,
    stopping: bool,
}

impl QueueState {
    fn pop_next(&mut self) -> Option<SpeciesCode> {
        self.foreground
            .pop_front()
            .or_else(|| self.background.pop_front())
    }

    fn len(&self) -> usize {
        self.foreground.len() + self.background.len()
    }
}

/// Handle to the serialized media fetch worker.
///
/// Cloning shares the same queue and worker. Enqueued species are resolved
/// one at a time with `interval` between requests; results land in the
/// shared media cache, failures are logged and dropped.
#[derive(Clone)]
pub struct MediaFetchQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl MediaFetchQueue {
    /// Spawns the worker task and returns the queue handle.
    pub fn spawn(resolver: MediaResolver, interval: Duration) -> Self {
        let queue = Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
        };

        let state = queue.state.clone();
        let notify = queue.notify.clone();
        tokio::spawn(async move {
            run_fetch_worker(resolver, state, notify, interval).await;
        });

        queue
    }

    /// Adds a species to the given lane. Duplicates already waiting in
    /// either lane are skipped.
    pub fn enqueue(&self, species: SpeciesCode, priority: FetchPriority) {
        {
            let mut state = self.state.lock();
            if state.stopping
                || state.foreground.contains(&species)
                || state.background.contains(&species)
            {
                return;
            }
            match priority {
                FetchPriority::Foreground => state.foreground.push_back(species),
                FetchPriority::Background => state.background.push_back(species),
            }
        }
        self.notify.notify_one();
    }

    /// Queues a batch of species for background image warm-up.
    pub fn prefetch_images(&self, species_list: Vec<SpeciesCode>) {
        for species in species_list {
            self.enqueue(species, FetchPriority::Background);
        }
    }

    /// Number of species still waiting in either lane.
    pub fn pending(&self) -> usize {
        self.state.lock().len()
    }

    /// Stops the worker task. Items still queued are dropped; later
    /// enqueues are ignored.
    pub fn shutdown(&self) {
        self.state.lock().stopping = true;
        self.notify.notify_one();
    }
}

async fn run_fetch_worker(
    resolver: MediaResolver,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    interval: Duration,
) {
    tracing::debug!("Media fetch worker started (interval {interval:?})");

    loop {
        let next = {
            let mut state = state.lock();
            if state.stopping {
                break;
            }
            state.pop_next()
        };

        match next {
            Some(species) => {
                if let Err(e) = resolver.image(&species).await {
                    tracing::debug!("Batch image fetch for {species} failed: {e}");
                }
                // Fixed spacing between successive library requests.
                tokio::time::sleep(interval).await;
            }
            // A shutdown between the check above and this park is caught by
            // the permit notify_one leaves behind.
            None => notify.notified().await,
        }
    }

    tracing::debug!("Media fetch worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex as PlMutex;

    use super::*;
    use crate::cache::{MemoryKeyValueStore, TtlCache};
    use crate::media::{MediaError, MediaKind, MediaProvider, MediaRecord};

    /// Provider that records the order species were requested in.
    #[derive(Default)]
    struct OrderRecordingProvider {
        order: PlMutex<Vec<String>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MediaProvider for OrderRecordingProvider {
        async fn search(
            &self,
            species: &SpeciesCode,
            _kind: MediaKind,
        ) -> Result<Option<MediaRecord>, MediaError> {
            self.order.lock().push(species.as_str().to_string());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(MediaRecord {
                media_url: Some(format!("https://cdn.example/{species}.jpg")),
                contributor: "Jo Birder".to_string(),
                contributor_url: String::new(),
            }))
        }
    }

    fn new_resolver(provider: Arc<OrderRecordingProvider>) -> MediaResolver {
        let cache = TtlCache::new(Arc::new(MemoryKeyValueStore::new()), 8);
        MediaResolver::new(provider, cache, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_jumps_ahead_of_background() {
        let provider = Arc::new(OrderRecordingProvider::default());
        let resolver = new_resolver(provider.clone());
        // Long interval: the worker is parked in its first sleep while we
        // stack the queue, so ordering is decided purely by priority.
        let queue = MediaFetchQueue::spawn(resolver, Duration::from_secs(1));

        queue.enqueue(SpeciesCode::new("bkcchi"), FetchPriority::Background);
        while provider.calls.load(Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        queue.enqueue(SpeciesCode::new("norcar"), FetchPriority::Background);
        queue.enqueue(SpeciesCode::new("amerob"), FetchPriority::Foreground);

        while provider.calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let order = provider.order.lock().clone();
        assert_eq!(order, vec!["bkcchi", "amerob", "norcar"]);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_are_skipped() {
        let provider = Arc::new(OrderRecordingProvider::default());
        let resolver = new_resolver(provider.clone());
        let queue = MediaFetchQueue::spawn(resolver, Duration::from_millis(10));

        queue.prefetch_images(vec![
            SpeciesCode::new("amerob"),
            SpeciesCode::new("amerob"),
            SpeciesCode::new("norcar"),
        ]);

        while provider.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_worker() {
        let provider = Arc::new(OrderRecordingProvider::default());
        let resolver = new_resolver(provider.clone());
        let queue = MediaFetchQueue::spawn(resolver, Duration::from_millis(10));

        queue.enqueue(SpeciesCode::new("amerob"), FetchPriority::Foreground);
        while provider.calls.load(Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        queue.shutdown();

        // Enqueues after shutdown are ignored and nothing further is
        // fetched, however long we wait.
        queue.enqueue(SpeciesCode::new("norcar"), FetchPriority::Foreground);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }
}
