//! Tokio driver for the video lifecycle state machine.
//!
//! Owns the unload grace timer: the driver sleeps toward the pending
//! deadline (when one exists) while processing UI events, and feeds both
//! into the state machine with a consistent `now`.

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep_until};

use crate::config::PlaybackConfig;

use super::VideoSurface;
use super::lifecycle::VideoLifecycle;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Events fed to the lifecycle driver from the hosting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEvent {
    VisibilityChanged { visible: bool },
    UserPlay,
    UserPause,
    PlaybackEnded,
    ReloadRequested,
    LoadSucceeded,
    LoadFailed,
    PageUnloaded,
}

/// Handle to a running lifecycle driver. Events are fire-and-forget; a
/// dropped driver simply swallows them.
#[derive(Clone)]
pub struct VideoLifecycleHandle {
    sender: mpsc::Sender<VideoEvent>,
}

impl VideoLifecycleHandle {
    pub async fn visibility_changed(&self, visible: bool) {
        self.send(VideoEvent::VisibilityChanged { visible }).await;
    }

    pub async fn user_play(&self) {
        self.send(VideoEvent::UserPlay).await;
    }

    pub async fn user_pause(&self) {
        self.send(VideoEvent::UserPause).await;
    }

    pub async fn playback_ended(&self) {
        self.send(VideoEvent::PlaybackEnded).await;
    }

    pub async fn reload_requested(&self) {
        self.send(VideoEvent::ReloadRequested).await;
    }

    pub async fn load_succeeded(&self) {
        self.send(VideoEvent::LoadSucceeded).await;
    }

    pub async fn load_failed(&self) {
        self.send(VideoEvent::LoadFailed).await;
    }

    /// Tears the driver down: timers cleared, resource released.
    pub async fn page_unloaded(&self) {
        self.send(VideoEvent::PageUnloaded).await;
    }

    async fn send(&self, event: VideoEvent) {
        if self.sender.send(event).await.is_err() {
            tracing::debug!("Video lifecycle driver gone, dropping {event:?}");
        }
    }
}

/// Spawns the lifecycle driver task for `surface` and returns its handle.
pub fn spawn_video_lifecycle<S>(surface: S, config: PlaybackConfig) -> VideoLifecycleHandle
where
    S: VideoSurface + 'static,
{
    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let lifecycle = VideoLifecycle::new(surface, config.unload_grace);

    tokio::spawn(async move {
        run_driver(lifecycle, receiver).await;
    });

    VideoLifecycleHandle { sender }
}

async fn run_driver<S: VideoSurface>(
    mut lifecycle: VideoLifecycle<S>,
    mut receiver: mpsc::Receiver<VideoEvent>,
) {
    tracing::debug!("Video lifecycle driver started");

    loop {
        let deadline = lifecycle.pending_deadline();
        // Placeholder target when no unload is pending; the branch is
        // disabled by the guard so the distant value is never awaited.
        let sleep_target =
            deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(24 * 3600));

        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else {
                    lifecycle.dispose();
                    break;
                };
                if !apply_event(&mut lifecycle, event) {
                    break;
                }
            }
            _ = sleep_until(sleep_target), if deadline.is_some() => {
                lifecycle.deadline_elapsed(Instant::now());
            }
        }
    }

    tracing::debug!("Video lifecycle driver stopped");
}

/// Feeds one event into the machine. Returns false when the driver should
/// stop.
fn apply_event<S: VideoSurface>(lifecycle: &mut VideoLifecycle<S>, event: VideoEvent) -> bool {
    let now = Instant::now();
    match event {
        VideoEvent::VisibilityChanged { visible } => lifecycle.visibility_changed(visible, now),
        VideoEvent::UserPlay => lifecycle.user_play(),
        VideoEvent::UserPause => lifecycle.user_pause(),
        VideoEvent::PlaybackEnded => lifecycle.playback_ended(),
        VideoEvent::ReloadRequested => lifecycle.reload_requested(),
        VideoEvent::LoadSucceeded => lifecycle.load_succeeded(now),
        VideoEvent::LoadFailed => lifecycle.load_failed(),
        VideoEvent::PageUnloaded => {
            lifecycle.dispose();
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::super::test_surface::{RecordingSurface, SurfaceCall};
    use super::*;

    fn config(grace: Duration) -> PlaybackConfig {
        PlaybackConfig {
            unload_grace: grace,
        }
    }

    async fn settle() {
        // Let the driver drain its channel before asserting.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_unloads_after_grace_period() {
        let surface = RecordingSurface::new();
        let handle = spawn_video_lifecycle(surface.clone(), config(Duration::from_secs(30)));

        handle.load_succeeded().await;
        handle.visibility_changed(false).await;
        settle().await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        assert!(surface.calls().contains(&SurfaceCall::Release));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_cancels_unload_on_quick_return() {
        let surface = RecordingSurface::new();
        let handle = spawn_video_lifecycle(surface.clone(), config(Duration::from_secs(30)));

        handle.load_succeeded().await;
        handle.visibility_changed(false).await;
        settle().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.visibility_changed(true).await;
        settle().await;

        // Long after the original deadline: no release must have happened.
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        assert!(!surface.calls().contains(&SurfaceCall::Release));
        assert!(surface.calls().contains(&SurfaceCall::Resume));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_unload_disposes() {
        let surface = RecordingSurface::new();
        let handle = spawn_video_lifecycle(surface.clone(), config(Duration::from_secs(30)));

        handle.load_succeeded().await;
        handle.page_unloaded().await;
        settle().await;

        assert!(surface.calls().contains(&SurfaceCall::Release));
    }
}
