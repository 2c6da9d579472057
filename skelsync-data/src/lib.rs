//! Skelsync Data Crate
//!
//! Skeleton frame types and the per-camera binary log format shared by the
//! recorder, the replay synchronizer and calibration.

pub mod log;
pub mod types;

pub use log::{LogError, LogReader, LogWriter, SessionId, load_camera_log};
pub use types::{
    CameraId, JOINT_COUNT, JOINT_VECTOR_LEN, JointSet, JointType, SkelFrame, UNTRACKED_POSITION,
};
