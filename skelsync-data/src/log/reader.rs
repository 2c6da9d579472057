//! Binary log decoding and bulk loading

use crate::log::{JOINT_RECORD_LEN, LogError, RECORD_LEN};
use crate::types::{CameraId, JOINT_COUNT, JointSet, JointType, SkelFrame};
use glam::Vec3;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Sequential reader over a single camera's log.
pub struct LogReader<R: Read> {
    inner: R,
    camera_id: CameraId,
    records_read: u64,
}

impl<R: Read> LogReader<R> {
    /// Read the header and check it against the camera slot the log is loaded into.
    pub fn open(inner: R, expected_camera_id: CameraId) -> Result<Self, LogError> {
        let reader = Self::open_any(inner)?;
        if reader.camera_id != expected_camera_id {
            return Err(LogError::HeaderMismatch {
                expected: expected_camera_id,
                found: reader.camera_id,
            });
        }
        Ok(reader)
    }

    /// Read the header and accept whichever camera id it names.
    pub fn open_any(mut inner: R) -> Result<Self, LogError> {
        let mut header = [0u8; 4];
        inner.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LogError::MissingHeader,
            _ => LogError::Io(e),
        })?;

        Ok(Self {
            inner,
            camera_id: i32::from_le_bytes(header),
            records_read: 0,
        })
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Decode the next record, or `None` at a clean end of log.
    pub fn next_frame(&mut self) -> Result<Option<SkelFrame>, LogError> {
        let mut record = [0u8; RECORD_LEN];
        if !self.fill_record(&mut record)? {
            return Ok(None);
        }

        let skeleton_id = i32::from_le_bytes(word(&record, 0));
        let frame_offset_ms = u32::from_le_bytes(word(&record, 4));

        let mut joints = JointSet::untracked();
        for slot in 0..JOINT_COUNT {
            let base = 8 + slot * JOINT_RECORD_LEN;
            let joint_type = record[base];
            let joint = JointType::from_index(joint_type).ok_or(LogError::InvalidJointType {
                joint_type,
                record: self.records_read,
            })?;
            let position = Vec3::new(
                f32::from_le_bytes(word(&record, base + 1)),
                f32::from_le_bytes(word(&record, base + 5)),
                f32::from_le_bytes(word(&record, base + 9)),
            );
            joints.set(joint, position);
        }

        self.records_read += 1;
        Ok(Some(SkelFrame::new(
            self.camera_id,
            skeleton_id,
            frame_offset_ms,
            joints,
        )))
    }

    // Returns false when the log ends exactly on a record boundary.
    fn fill_record(&mut self, record: &mut [u8; RECORD_LEN]) -> Result<bool, LogError> {
        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.inner.read(&mut record[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(LogError::Truncated {
                        record: self.records_read,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<SkelFrame, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

fn word(record: &[u8], at: usize) -> [u8; 4] {
    [record[at], record[at + 1], record[at + 2], record[at + 3]]
}

/// Load a camera's entire log into memory, in recorded order.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), camera = camera_id))]
pub fn load_camera_log(path: impl AsRef<Path>, camera_id: CameraId) -> Result<Vec<SkelFrame>, LogError> {
    debug!("Loading camera log");
    let file = File::open(path.as_ref())?;
    let reader = LogReader::open(BufReader::new(file), camera_id)?;

    let mut frames: Vec<SkelFrame> = Vec::new();
    for frame in reader {
        let frame = frame?;
        if let Some(last) = frames.last() {
            if frame.frame_offset_ms() < last.frame_offset_ms() {
                warn!(
                    "Frame offset went backwards: {}ms after {}ms (record {})",
                    frame.frame_offset_ms(),
                    last.frame_offset_ms(),
                    frames.len()
                );
            }
        }
        frames.push(frame);
    }

    info!("Loaded {} frames for camera {}", frames.len(), camera_id);
    Ok(frames)
}
