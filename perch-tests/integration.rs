//! Integration tests for Perch
//!
//! These tests verify the integration between different components of the
//! system: the full resolution flow through the engine actor, offline
//! recovery from persisted cache fragments, and the playback lifecycle
//! driver.

#[path = "integration/bird_flow.rs"]
mod bird_flow;

#[path = "integration/offline_recovery.rs"]
mod offline_recovery;

#[path = "integration/playback_lifecycle.rs"]
mod playback_lifecycle;
