//! Recorded session ingestion
//!
//! Loads per-camera logs and replays them as time-aligned rounds, one frame
//! per camera.

pub mod replay;

pub use replay::{FRAME_TIME_THRESHOLD_MS, SyncError, SyncedFrames, Synchronizer};
