//! Per-camera session recording.

use crate::source::{FrameSink, SkeletonSnapshot, SkeletonTrackingState};
use chrono::{DateTime, Local};
use skelsync_data::{CameraId, JointSet, LogError, LogWriter, SessionId, SkelFrame};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Camera {0} already has an open log")]
    AlreadyOpen(CameraId),

    #[error("Camera {0} has no open log")]
    UnknownCamera(CameraId),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one binary log per camera for a single recording session.
///
/// Logs are buffered; call [`Recorder::close`] to flush them. Dropping a
/// recorder without closing it may lose buffered frames.
pub struct Recorder {
    dir: PathBuf,
    session: SessionId,
    started_at: DateTime<Local>,
    writers: HashMap<CameraId, LogWriter<BufWriter<File>>>,
}

impl Recorder {
    /// Start a session in `dir`. No files are created until a camera is opened.
    pub fn new(dir: impl AsRef<Path>, started_at: DateTime<Local>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            session: SessionId::from_datetime(&started_at),
            started_at,
            writers: HashMap::new(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_open(&self, camera_id: CameraId) -> bool {
        self.writers.contains_key(&camera_id)
    }

    /// Create the camera's log file and write its header.
    pub fn create_file(&mut self, camera_id: CameraId) -> Result<PathBuf, RecorderError> {
        if self.is_open(camera_id) {
            return Err(RecorderError::AlreadyOpen(camera_id));
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.session.log_path(&self.dir, camera_id);
        let file = File::create(&path)?;
        let writer = LogWriter::new(BufWriter::new(file), camera_id)?;
        self.writers.insert(camera_id, writer);

        info!("Recording camera {} to {}", camera_id, path.display());
        Ok(path)
    }

    /// Append one skeleton to the camera's log.
    ///
    /// Only fully tracked skeletons are written; others return `Ok(false)`.
    /// Joints that are neither tracked nor inferred, or missing from the
    /// snapshot, are written as the untracked sentinel.
    pub fn record_skeleton(
        &mut self,
        camera_id: CameraId,
        skeleton: &SkeletonSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<bool, RecorderError> {
        let offset = self.offset_ms(timestamp);
        let writer = self
            .writers
            .get_mut(&camera_id)
            .ok_or(RecorderError::UnknownCamera(camera_id))?;

        if skeleton.state != SkeletonTrackingState::Tracked {
            debug!(
                "Dropping skeleton {} from camera {}: {:?}",
                skeleton.tracking_id, camera_id, skeleton.state
            );
            return Ok(false);
        }

        let mut joints = JointSet::untracked();
        for joint in skeleton.joints.iter().filter(|j| j.state.has_position()) {
            joints.set(joint.joint_type, joint.position);
        }

        writer.write_frame(&SkelFrame::new(camera_id, skeleton.tracking_id, offset, joints))?;
        Ok(true)
    }

    /// Flush and close every log, returning frames written per camera in
    /// camera order.
    ///
    /// Every log is flushed even if an earlier one fails; the first failure is
    /// returned.
    pub fn close(self) -> Result<Vec<(CameraId, u64)>, RecorderError> {
        let mut writers: Vec<_> = self.writers.into_iter().collect();
        writers.sort_by_key(|(camera_id, _)| *camera_id);

        let counts = close_writers(writers)?;
        info!("Session {} closed: {:?}", self.session, counts);
        Ok(counts)
    }

    fn offset_ms(&self, timestamp: DateTime<Local>) -> u32 {
        let elapsed = timestamp.signed_duration_since(self.started_at).num_milliseconds();
        elapsed.clamp(0, i64::from(u32::MAX)) as u32
    }
}

impl FrameSink for Recorder {
    type Error = RecorderError;

    /// Opens the camera's log on its first frame.
    fn on_frame_captured(
        &mut self,
        camera_id: CameraId,
        skeleton: &SkeletonSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<bool, RecorderError> {
        if !self.is_open(camera_id) {
            self.create_file(camera_id)?;
        }
        self.record_skeleton(camera_id, skeleton, timestamp)
    }
}

fn close_writers<W: Write>(writers: Vec<(CameraId, LogWriter<W>)>) -> Result<Vec<(CameraId, u64)>, RecorderError> {
    let mut counts = Vec::with_capacity(writers.len());
    let mut first_error = None;
    for (camera_id, writer) in writers {
        let frames = writer.frames_written();
        match writer.into_inner() {
            Ok(_) => counts.push((camera_id, frames)),
            Err(e) => {
                warn!("Failed to flush log for camera {}: {}", camera_id, e);
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(counts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JointTrackingState;
    use chrono::Duration;
    use glam::Vec3;
    use skelsync_data::{JointType, UNTRACKED_POSITION, load_camera_log};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    /// Accepts writes but refuses to flush.
    struct StuckWriter;

    impl Write for StuckWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk gone"))
        }
    }

    /// Sees bytes only once the buffer in front of it is flushed.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn skeleton(id: i32) -> SkeletonSnapshot {
        let positions: Vec<Vec3> = (0..20).map(|i| Vec3::new(i as f32, 1.0, 2.0)).collect();
        SkeletonSnapshot::tracked(id, &positions)
    }

    #[test]
    fn test_duplicate_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path(), Local::now());
        recorder.create_file(1).unwrap();
        assert!(matches!(recorder.create_file(1), Err(RecorderError::AlreadyOpen(1))));
    }

    #[test]
    fn test_record_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let start = Local::now();
        let mut recorder = Recorder::new(dir.path(), start);
        assert!(matches!(
            recorder.record_skeleton(4, &skeleton(1), start),
            Err(RecorderError::UnknownCamera(4))
        ));
    }

    #[test]
    fn test_offsets_and_joint_states() {
        let dir = tempfile::tempdir().unwrap();
        let start = Local::now();
        let mut recorder = Recorder::new(dir.path(), start);
        let path = recorder.create_file(0).unwrap();

        let mut partial = skeleton(9);
        partial.joints[3].state = JointTrackingState::NotTracked;
        partial.joints[4].state = JointTrackingState::Inferred;
        partial.joints.truncate(19);

        assert!(recorder.record_skeleton(0, &skeleton(9), start - Duration::milliseconds(50)).unwrap());
        assert!(recorder.record_skeleton(0, &partial, start + Duration::milliseconds(1250)).unwrap());
        assert_eq!(recorder.close().unwrap(), vec![(0, 2)]);

        let frames = load_camera_log(&path, 0).unwrap();
        assert_eq!(frames[0].frame_offset_ms(), 0);
        assert_eq!(frames[1].frame_offset_ms(), 1250);
        assert_eq!(frames[1].skeleton_id(), 9);

        let joints = frames[1].joints();
        assert_eq!(joints.get(JointType::Head), Vec3::splat(UNTRACKED_POSITION));
        assert_eq!(joints.get(JointType::ShoulderLeft), Vec3::new(4.0, 1.0, 2.0));
        assert!(!joints.is_tracked(JointType::FootRight));
    }

    #[test]
    fn test_untracked_skeletons_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let start = Local::now();
        let mut recorder = Recorder::new(dir.path(), start);

        let mut position_only = skeleton(2);
        position_only.state = SkeletonTrackingState::PositionOnly;
        assert!(!recorder.on_frame_captured(1, &position_only, start).unwrap());
        assert!(recorder.is_open(1));
        assert!(recorder.on_frame_captured(1, &skeleton(2), start).unwrap());

        assert_eq!(recorder.close().unwrap(), vec![(1, 1)]);
    }

    #[test]
    fn test_close_flushes_every_log_after_failure() {
        let shared = SharedBuffer::default();
        let frame = SkelFrame::new(1, 3, 10, JointSet::untracked());

        let mut failing = LogWriter::new(BufWriter::new(Box::new(StuckWriter) as Box<dyn Write>), 0).unwrap();
        failing.write_frame(&SkelFrame::new(0, 3, 10, JointSet::untracked())).unwrap();
        let mut healthy = LogWriter::new(BufWriter::new(Box::new(shared.clone()) as Box<dyn Write>), 1).unwrap();
        healthy.write_frame(&frame).unwrap();
        assert!(shared.0.borrow().is_empty());

        let result = close_writers(vec![(0, failing), (1, healthy)]);
        assert!(matches!(result, Err(RecorderError::Log(LogError::Io(_)))));
        assert_eq!(shared.0.borrow().len(), 4 + skelsync_data::log::RECORD_LEN);
    }
}
