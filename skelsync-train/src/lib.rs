//! Skelsync Training Crate
//!
//! Learns per-camera transforms that map skeletons tracked by one depth
//! camera into the coordinate space of the reference camera.
//!
//! ## Modules
//!
//! - [`math`]: Dense `f32` matrices
//! - [`nn`]: Three-layer backpropagation network with momentum
//! - [`ingest`]: Multi-camera log replay and frame synchronization
//! - [`calibration`]: Per-camera networks trained from a replayed session

pub mod calibration;
pub mod ingest;
pub mod math;
pub mod nn;

pub use calibration::{Calibration, CalibrationConfig, CalibrationError, CalibrationModel, CalibrationReport};
pub use ingest::{SyncError, SyncedFrames, Synchronizer};
pub use math::{Matrix, MatrixError};
pub use nn::{Network, NetworkConfig, NetworkError, TrainingMode};
