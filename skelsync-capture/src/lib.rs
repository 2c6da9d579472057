//! Skelsync Capture - Skeleton ingestion and session recording
//!
//! Tracking cameras push [`SkeletonSnapshot`]s into a [`FrameSink`]. The
//! [`Recorder`] sink writes one binary log per camera, which the training
//! crate later replays for calibration.
//!
//! ## Example
//!
//! ```ignore
//! use skelsync_capture::{CameraRegistry, FrameSink, Recorder};
//!
//! let mut registry = CameraRegistry::new();
//! let mut recorder = Recorder::new("sessions", chrono::Local::now());
//! let camera = registry.id_for(&sender_addr);
//! recorder.on_frame_captured(camera, &snapshot, chrono::Local::now())?;
//! recorder.close()?;
//! ```

pub mod recorder;
pub mod registry;
mod source;
pub mod synthetic;

pub use recorder::{Recorder, RecorderError};
pub use registry::CameraRegistry;
pub use synthetic::{SyntheticFrame, SyntheticWalker};
pub use source::{FrameSink, JointTrackingState, SkeletonSnapshot, SkeletonTrackingState, TrackedJoint};
