//! Binary log encoding

use crate::log::{LogError, RECORD_LEN};
use crate::types::{CameraId, JointType, SkelFrame};
use std::io::Write;

/// Appends skeleton records to a single camera's log.
///
/// The camera id header is written on construction. Records are written
/// verbatim; callers are expected to append in time order.
pub struct LogWriter<W: Write> {
    inner: W,
    camera_id: CameraId,
    frames_written: u64,
}

impl<W: Write> LogWriter<W> {
    /// Start a new log on `inner` by writing the camera id header.
    pub fn new(mut inner: W, camera_id: CameraId) -> Result<Self, LogError> {
        inner.write_all(&camera_id.to_le_bytes())?;
        Ok(Self {
            inner,
            camera_id,
            frames_written: 0,
        })
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append one skeleton record.
    pub fn write_frame(&mut self, frame: &SkelFrame) -> Result<(), LogError> {
        let record = encode_record(frame);
        self.inner.write_all(&record)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W, LogError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn encode_record(frame: &SkelFrame) -> [u8; RECORD_LEN] {
    let mut record = [0u8; RECORD_LEN];
    record[0..4].copy_from_slice(&frame.skeleton_id().to_le_bytes());
    record[4..8].copy_from_slice(&frame.frame_offset_ms().to_le_bytes());

    let mut cursor = 8;
    for joint in JointType::ALL {
        let position = frame.joints().get(joint);
        record[cursor] = joint as u8;
        record[cursor + 1..cursor + 5].copy_from_slice(&position.x.to_le_bytes());
        record[cursor + 5..cursor + 9].copy_from_slice(&position.y.to_le_bytes());
        record[cursor + 9..cursor + 13].copy_from_slice(&position.z.to_le_bytes());
        cursor += 13;
    }
    record
}
