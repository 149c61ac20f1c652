//! Visibility-driven video playback lifecycle.
//!
//! A finite-state machine decides when the video element plays, pauses,
//! releases its resource, and reloads, driven by abstract visibility and
//! timer events so it is testable without a real browser. The tokio driver
//! in [`driver`] owns the unload grace timer.

pub mod driver;
pub mod lifecycle;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_surface;

use tokio::time::Instant;

pub use driver::{VideoEvent, VideoLifecycleHandle, spawn_video_lifecycle};
pub use lifecycle::VideoLifecycle;

/// Playback position and play/pause state captured when the tab went
/// hidden, used to restore the exact pre-hide experience on return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumeState {
    pub position_secs: f64,
    pub was_playing: bool,
}

/// Lifecycle phase of the video element.
///
/// The video resource exists exactly in `Playing`, `PausedVisible`,
/// `HiddenPending`, and `Reloading`; `Unloaded` and `ImageFallback` imply
/// no resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoPhase {
    /// Video is playing and the tab is visible.
    Playing,
    /// Video is paused but still loaded and visible.
    PausedVisible,
    /// Tab is hidden; the resource is kept until the deadline in case the
    /// user comes right back.
    HiddenPending {
        deadline: Instant,
        resume: ResumeState,
    },
    /// Resource released, poster shown, replay affordance available.
    Unloaded,
    /// A fresh resource is loading after a reload request.
    Reloading,
    /// Terminal: video gave up, a static image is shown instead.
    ImageFallback,
}

/// The concrete video element, an external collaborator.
///
/// Commands are fire-and-forget; confirmations (playback started, load
/// failed) come back as events into the state machine.
pub trait VideoSurface: Send {
    /// Pauses playback, keeping the resource loaded.
    fn pause(&mut self);

    /// Resumes playback from the current position.
    fn resume(&mut self);

    /// Current playback position in seconds.
    fn playback_position(&self) -> f64;

    /// Detaches and discards the video resource entirely and shows the
    /// poster image. Discarding (rather than blanking the source) avoids
    /// spurious error events from the element.
    fn release(&mut self);

    /// Constructs a fresh resource from the original URL and re-attaches
    /// load/error/progress listeners. Playback starts from time zero.
    fn begin_reload(&mut self);

    /// Swaps the element for the static fallback image.
    fn show_fallback_image(&mut self);
}
