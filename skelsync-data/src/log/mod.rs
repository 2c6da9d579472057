//! Per-camera binary skeleton logs
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! i32 camera_id                      header, once
//! repeated:
//!   i32 skeleton_tracking_id
//!   u32 frame_offset_ms
//!   JOINT_COUNT x { u8 joint_type; f32 x; f32 y; f32 z }
//! ```

mod reader;
mod session;
mod writer;

pub use reader::{LogReader, load_camera_log};
pub use session::SessionId;
pub use writer::LogWriter;

use crate::types::{CameraId, JOINT_COUNT};
use thiserror::Error;

/// Encoded size of one joint entry.
pub const JOINT_RECORD_LEN: usize = 1 + 3 * 4;

/// Encoded size of one skeleton record.
pub const RECORD_LEN: usize = 4 + 4 + JOINT_COUNT * JOINT_RECORD_LEN;

/// Errors raised while reading or writing a camera log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log is missing its camera id header")]
    MissingHeader,

    #[error("Log header holds camera {found}, expected camera {expected}")]
    HeaderMismatch { expected: CameraId, found: CameraId },

    #[error("Log truncated inside record {record}")]
    Truncated { record: u64 },

    #[error("Invalid joint type {joint_type} in record {record}")]
    InvalidJointType { joint_type: u8, record: u64 },
}
