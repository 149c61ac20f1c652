//! Recording video surface for lifecycle tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::VideoSurface;

/// Every surface command the lifecycle can issue, recorded in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    Pause,
    Resume,
    Release,
    BeginReload,
    ShowFallbackImage,
}

#[derive(Debug, Default)]
struct SurfaceState {
    calls: Vec<SurfaceCall>,
    position_secs: f64,
}

/// Surface that records commands and simulates a playback position.
///
/// Clones share state, so a test can keep one clone while the driver owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates playback having advanced to `secs`.
    pub fn set_position(&self, secs: f64) {
        self.state.lock().position_secs = secs;
    }

    /// Commands issued so far, in order.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state.lock().calls.clone()
    }
}

impl VideoSurface for RecordingSurface {
    fn pause(&mut self) {
        self.state.lock().calls.push(SurfaceCall::Pause);
    }

    fn resume(&mut self) {
        self.state.lock().calls.push(SurfaceCall::Resume);
    }

    fn playback_position(&self) -> f64 {
        self.state.lock().position_secs
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(SurfaceCall::Release);
        state.position_secs = 0.0;
    }

    fn begin_reload(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(SurfaceCall::BeginReload);
        state.position_secs = 0.0;
    }

    fn show_fallback_image(&mut self) {
        self.state.lock().calls.push(SurfaceCall::ShowFallbackImage);
    }
}
