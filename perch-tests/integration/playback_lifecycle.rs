//! Playback lifecycle scenarios through the tokio driver.

use std::time::Duration;

use perch_core::config::PlaybackConfig;
use perch_core::playback::spawn_video_lifecycle;
use perch_core::VideoSurface;
use perch_core::playback::test_surface::{RecordingSurface, SurfaceCall};

fn thirty_second_grace() -> PlaybackConfig {
    PlaybackConfig {
        unload_grace: Duration::from_secs(30),
    }
}

/// Lets the driver drain its event channel.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_brief_hide_resumes_at_same_position() {
    let surface = RecordingSurface::new();
    let handle = spawn_video_lifecycle(surface.clone(), thirty_second_grace());

    handle.load_succeeded().await;
    surface.set_position(12.5);

    // Hidden at t=0, visible again at t=10s.
    handle.visibility_changed(false).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.visibility_changed(true).await;
    settle().await;

    assert_eq!(surface.calls(), vec![SurfaceCall::Pause, SurfaceCall::Resume]);
    // The resource never went away: the position is untouched.
    assert!((surface.playback_position() - 12.5).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_long_hide_unloads_and_requires_manual_reload() {
    let surface = RecordingSurface::new();
    let handle = spawn_video_lifecycle(surface.clone(), thirty_second_grace());

    handle.load_succeeded().await;
    surface.set_position(12.5);

    // Hidden at t=0, visible again at t=35s: past the grace period.
    handle.visibility_changed(false).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(35)).await;
    handle.visibility_changed(true).await;
    settle().await;

    let calls = surface.calls();
    assert!(calls.contains(&SurfaceCall::Release));
    // Poster shown, replay affordance pending: no auto-resume.
    assert!(!calls.contains(&SurfaceCall::Resume));

    // Manual reload starts from zero.
    handle.reload_requested().await;
    handle.load_succeeded().await;
    settle().await;

    assert!(surface.calls().contains(&SurfaceCall::BeginReload));
    assert!(surface.playback_position().abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_reload_failure_shows_static_image() {
    let surface = RecordingSurface::new();
    let handle = spawn_video_lifecycle(surface.clone(), thirty_second_grace());

    handle.load_succeeded().await;
    handle.visibility_changed(false).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(31)).await;
    settle().await;

    handle.reload_requested().await;
    handle.load_failed().await;
    settle().await;

    assert!(surface.calls().contains(&SurfaceCall::ShowFallbackImage));
}

#[tokio::test(start_paused = true)]
async fn test_playback_error_on_proven_video_is_ignored() {
    let surface = RecordingSurface::new();
    let handle = spawn_video_lifecycle(surface.clone(), thirty_second_grace());

    handle.load_succeeded().await;
    handle.load_failed().await;
    settle().await;

    assert!(!surface.calls().contains(&SurfaceCall::ShowFallbackImage));
}

#[tokio::test(start_paused = true)]
async fn test_page_unload_tears_down() {
    let surface = RecordingSurface::new();
    let handle = spawn_video_lifecycle(surface.clone(), thirty_second_grace());

    handle.load_succeeded().await;
    handle.visibility_changed(false).await;
    handle.page_unloaded().await;
    settle().await;

    assert!(surface.calls().contains(&SurfaceCall::Release));
}
