//! The video lifecycle state machine.

use std::time::Duration;

use tokio::time::Instant;

use super::{ResumeState, VideoPhase, VideoSurface};

/// Visibility-driven playback state machine over an abstract surface.
///
/// Starts in `Reloading`: the initial load is in flight when the manager
/// takes over, and its outcome decides between `Playing` and the terminal
/// `ImageFallback`. All timing comes in through `now` parameters; the
/// machine never reads the clock itself.
pub struct VideoLifecycle<S: VideoSurface> {
    surface: S,
    phase: VideoPhase,
    grace: Duration,
    visible: bool,
    /// Whether the *current* resource has ever confirmed playback. Reset on
    /// release: a reloaded resource must prove itself again before load
    /// errors are forgiven.
    resource_has_played: bool,
}

impl<S: VideoSurface> VideoLifecycle<S> {
    pub fn new(surface: S, grace: Duration) -> Self {
        Self {
            surface,
            phase: VideoPhase::Reloading,
            grace,
            visible: true,
            resource_has_played: false,
        }
    }

    pub fn phase(&self) -> VideoPhase {
        self.phase
    }

    /// Deadline of a pending unload, if one is scheduled.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.phase {
            VideoPhase::HiddenPending { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Tab visibility changed.
    pub fn visibility_changed(&mut self, visible: bool, now: Instant) {
        self.visible = visible;

        if !visible {
            match self.phase {
                VideoPhase::Playing | VideoPhase::PausedVisible => {
                    let resume = ResumeState {
                        position_secs: self.surface.playback_position(),
                        was_playing: matches!(self.phase, VideoPhase::Playing),
                    };
                    self.surface.pause();
                    self.phase = VideoPhase::HiddenPending {
                        deadline: now + self.grace,
                        resume,
                    };
                    tracing::debug!(
                        "Tab hidden at {:.1}s, unload in {:?}",
                        resume.position_secs,
                        self.grace
                    );
                }
                _ => {}
            }
            return;
        }

        match self.phase {
            VideoPhase::HiddenPending { resume, .. } => {
                // Back before the deadline: cancel the unload, restore the
                // pre-hide state.
                if resume.was_playing {
                    self.surface.resume();
                    self.phase = VideoPhase::Playing;
                } else {
                    self.phase = VideoPhase::PausedVisible;
                }
                tracing::debug!("Tab visible again, unload cancelled");
            }
            // No resource exists; the surface already shows the poster and
            // replay affordance.
            VideoPhase::Unloaded => {}
            _ => {}
        }
    }

    /// The unload grace timer fired. Only acts if the deadline is actually
    /// due and the tab is still hidden; a stale timer after a visibility
    /// flip is a no-op.
    pub fn deadline_elapsed(&mut self, now: Instant) {
        let VideoPhase::HiddenPending { deadline, .. } = self.phase else {
            return;
        };
        if now < deadline || self.visible {
            return;
        }

        self.surface.pause();
        self.surface.release();
        // Resume state dies with the resource: a reload starts from zero.
        self.resource_has_played = false;
        self.phase = VideoPhase::Unloaded;
        tracing::debug!("Grace period elapsed while hidden, video resource released");
    }

    /// User pressed play.
    pub fn user_play(&mut self) {
        if self.phase == VideoPhase::PausedVisible {
            self.surface.resume();
            self.phase = VideoPhase::Playing;
        }
    }

    /// User pressed pause.
    pub fn user_pause(&mut self) {
        if self.phase == VideoPhase::Playing {
            self.surface.pause();
            self.phase = VideoPhase::PausedVisible;
        }
    }

    /// Playback reached the end of the clip.
    pub fn playback_ended(&mut self) {
        if self.phase == VideoPhase::Playing {
            self.phase = VideoPhase::PausedVisible;
        }
    }

    /// User asked for the video back after an unload.
    pub fn reload_requested(&mut self) {
        if self.phase == VideoPhase::Unloaded {
            self.surface.begin_reload();
            self.phase = VideoPhase::Reloading;
            tracing::debug!("Reloading video resource");
        }
    }

    /// The surface confirmed playback actually started.
    ///
    /// If the tab went hidden while the load was in flight, the fresh
    /// resource is paused immediately and the unload grace timer starts
    /// now rather than letting it play hidden.
    pub fn load_succeeded(&mut self, now: Instant) {
        if self.phase != VideoPhase::Reloading {
            return;
        }
        self.resource_has_played = true;

        if self.visible {
            self.phase = VideoPhase::Playing;
            return;
        }

        self.surface.pause();
        self.phase = VideoPhase::HiddenPending {
            deadline: now + self.grace,
            resume: ResumeState {
                position_secs: self.surface.playback_position(),
                was_playing: true,
            },
        };
        tracing::debug!("Load finished with tab hidden, pausing and scheduling unload");
    }

    /// The surface reported a load/playback error.
    ///
    /// Before the current resource's first confirmed playback this is
    /// fatal: fall back to the static image, terminally. After it, the
    /// error is a transient network hiccup on a proven resource and is
    /// ignored.
    pub fn load_failed(&mut self) {
        if self.resource_has_played {
            tracing::debug!("Ignoring playback error on a proven resource");
            return;
        }
        if matches!(self.phase, VideoPhase::ImageFallback) {
            return;
        }

        self.surface.show_fallback_image();
        self.phase = VideoPhase::ImageFallback;
        tracing::warn!("Video load failed before first playback, showing static image");
    }

    /// Page teardown: cancel any pending unload and release the resource.
    pub fn dispose(&mut self) {
        match self.phase {
            VideoPhase::Playing
            | VideoPhase::PausedVisible
            | VideoPhase::HiddenPending { .. }
            | VideoPhase::Reloading => {
                self.surface.release();
            }
            VideoPhase::Unloaded | VideoPhase::ImageFallback => {}
        }
        self.resource_has_played = false;
        self.phase = VideoPhase::Unloaded;
        tracing::debug!("Video lifecycle disposed");
    }
}
