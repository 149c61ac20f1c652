//! Prefetch slot and media byte warming for the next bird.
//!
//! After a response is served, the next record is resolved in the
//! background and parked here so the following new tab opens instantly.
//! The slot holds at most one value; consuming it clears it atomically.
//!
//! Invalidation (region change, cache deletion) bumps an epoch instead of
//! cancelling in-flight work: a warm task finishing after invalidation sees
//! the epoch moved on and discards its result.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::header::RANGE;

use super::BirdInfo;
use crate::cache::RegionCode;

#[derive(Default)]
struct SlotState {
    value: Option<(RegionCode, BirdInfo)>,
    epoch: u64,
}

/// The single in-memory prefetch slot, process-lifetime scoped.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct PrefetchSlot {
    state: Arc<Mutex<SlotState>>,
}

impl PrefetchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the prefetched record if one is parked for `region`, clearing
    /// the slot. A record parked for a different region (a race the epoch
    /// check missed) is dropped rather than served.
    pub fn take(&self, region: &RegionCode) -> Option<BirdInfo> {
        let mut state = self.state.lock();
        let (parked_region, info) = state.value.take()?;
        if parked_region == *region {
            Some(info)
        } else {
            tracing::debug!(
                "Dropping prefetched bird for {parked_region}, request is for {region}"
            );
            None
        }
    }

    /// Epoch to capture before starting a warm task.
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Parks a record, unless the slot was invalidated since `epoch` was
    /// captured. Returns whether the record was kept.
    pub fn store_if_current(&self, region: RegionCode, epoch: u64, info: BirdInfo) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        state.value = Some((region, info));
        true
    }

    /// Clears the slot and invalidates any warm task still in flight.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.value = None;
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().value.is_none()
    }
}

/// Issues no-credential byte-range requests for the record's media URLs,
/// purely to populate the HTTP cache. Failures are logged, never surfaced.
pub async fn warm_media_bytes(client: &reqwest::Client, info: &BirdInfo) {
    warm_url(client, &info.image.image_url).await;
    if let Some(audio) = &info.audio {
        warm_url(client, &audio.audio_url).await;
    }
}

async fn warm_url(client: &reqwest::Client, url: &str) {
    match client.get(url).header(RANGE, "bytes=0-").send().await {
        Ok(response) => {
            let status = response.status();
            match response.bytes().await {
                Ok(body) => {
                    tracing::debug!("Warmed {url}: status {status}, {} bytes", body.len());
                }
                Err(e) => tracing::debug!("Warm body read for {url} failed: {e}"),
            }
        }
        Err(e) => tracing::debug!("Warm fetch for {url} failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_mocks::test_bird_info;
    use super::*;

    #[test]
    fn test_take_clears_the_slot() {
        let slot = PrefetchSlot::new();
        let region = RegionCode::new("US");
        let epoch = slot.epoch();

        assert!(slot.store_if_current(region.clone(), epoch, test_bird_info("amerob")));
        assert!(slot.take(&region).is_some());
        assert!(slot.take(&region).is_none());
        assert!(slot.is_empty());
    }

    #[test]
    fn test_take_drops_mismatched_region() {
        let slot = PrefetchSlot::new();
        let epoch = slot.epoch();
        slot.store_if_current(RegionCode::new("US"), epoch, test_bird_info("amerob"));

        assert!(slot.take(&RegionCode::new("CA")).is_none());
        // Dropped, not kept for a later US request.
        assert!(slot.is_empty());
    }

    #[test]
    fn test_invalidation_rejects_stale_epoch() {
        let slot = PrefetchSlot::new();
        let region = RegionCode::new("US");
        let epoch = slot.epoch();

        slot.invalidate();

        assert!(!slot.store_if_current(region.clone(), epoch, test_bird_info("amerob")));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_store_overwrites_previous_value() {
        let slot = PrefetchSlot::new();
        let region = RegionCode::new("US");

        slot.store_if_current(region.clone(), slot.epoch(), test_bird_info("amerob"));
        slot.store_if_current(region.clone(), slot.epoch(), test_bird_info("norcar"));

        let info = slot.take(&region).unwrap();
        assert_eq!(info.bird.species_code.as_str(), "norcar");
        assert!(slot.is_empty());
    }
}
