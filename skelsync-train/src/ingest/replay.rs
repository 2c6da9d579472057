//! Multi-camera session replay with tolerance-based frame synchronization

use skelsync_data::{CameraId, LogError, SessionId, SkelFrame, load_camera_log};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum head offset distance, in milliseconds, for frames of different
/// cameras to count as the same instant. Below one frame period at 30 fps.
pub const FRAME_TIME_THRESHOLD_MS: u32 = 24;

/// Errors raised while loading a recorded session.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Session needs at least one camera")]
    NoCameras,

    #[error("Failed to load log for camera {camera} from {}: {source}", .path.display())]
    Log {
        camera: CameraId,
        path: PathBuf,
        #[source]
        source: LogError,
    },
}

/// One frame per camera, all recorded at the same logical instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedFrames {
    frames: Vec<SkelFrame>,
}

impl SyncedFrames {
    /// Frame of a given camera.
    pub fn get(&self, camera_id: CameraId) -> Option<&SkelFrame> {
        usize::try_from(camera_id).ok().and_then(|i| self.frames.get(i))
    }

    /// Frame of the reference camera (camera 0).
    pub fn reference(&self) -> &SkelFrame {
        &self.frames[0]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in camera id order.
    pub fn iter(&self) -> impl Iterator<Item = &SkelFrame> {
        self.frames.iter()
    }

    pub fn into_vec(self) -> Vec<SkelFrame> {
        self.frames
    }
}

/// Merges per-camera recordings into time-aligned rounds.
///
/// Owns one queue per camera and drains them destructively. Camera ids are
/// the queue indices.
#[derive(Debug)]
pub struct Synchronizer {
    queues: Vec<VecDeque<SkelFrame>>,
    tolerance_ms: u32,
    rounds: usize,
    discarded: usize,
}

impl Synchronizer {
    /// Bulk-load every camera log of a session from `dir`.
    ///
    /// Fails if any log is missing, unreadable, truncated or stores a camera
    /// id other than its slot.
    #[tracing::instrument(skip_all, fields(session = %session, cameras = num_cameras))]
    pub fn load(
        dir: impl AsRef<Path>,
        session: SessionId,
        num_cameras: usize,
        tolerance_ms: u32,
    ) -> Result<Self, SyncError> {
        if num_cameras == 0 {
            return Err(SyncError::NoCameras);
        }

        info!("Loading camera logs for session {}", session);
        let mut logs = Vec::with_capacity(num_cameras);
        for camera in 0..num_cameras as CameraId {
            let path = session.log_path(dir.as_ref(), camera);
            let frames = load_camera_log(&path, camera).map_err(|source| SyncError::Log {
                camera,
                path: path.clone(),
                source,
            })?;
            if frames.is_empty() {
                warn!("Camera {} has an empty log at {}", camera, path.display());
            }
            logs.push(frames);
        }

        let sync = Self::from_logs(logs, tolerance_ms);
        info!(
            "Session {} loaded: {} frames across {} cameras",
            session,
            sync.total_remaining(),
            num_cameras
        );
        Ok(sync)
    }

    /// Build from in-memory logs, indexed by camera id.
    ///
    /// A tolerance of 0 is raised to 1ms so the earliest head always
    /// synchronizes with itself.
    pub fn from_logs(logs: Vec<Vec<SkelFrame>>, tolerance_ms: u32) -> Self {
        Self {
            queues: logs.into_iter().map(VecDeque::from).collect(),
            tolerance_ms: tolerance_ms.max(1),
            rounds: 0,
            discarded: 0,
        }
    }

    pub fn num_cameras(&self) -> usize {
        self.queues.len()
    }

    pub fn tolerance_ms(&self) -> u32 {
        self.tolerance_ms
    }

    /// Frames still queued for a camera.
    pub fn remaining(&self, camera_id: CameraId) -> usize {
        usize::try_from(camera_id)
            .ok()
            .and_then(|i| self.queues.get(i))
            .map_or(0, VecDeque::len)
    }

    pub fn total_remaining(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Rounds produced so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Frames popped by passes that did not synchronize every camera.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Produce the next synchronized round, or `None` once any camera's
    /// queue runs out.
    ///
    /// Each pass finds the earliest head across all cameras and pops the head
    /// of every camera within the tolerance of it. A pass that catches every
    /// camera is the round. Otherwise the popped frames are dropped, the
    /// lagging heads are kept, and the scan repeats on the reduced queues.
    pub fn next_round(&mut self) -> Option<SyncedFrames> {
        let tolerance = self.tolerance_ms;
        loop {
            let min_offset = self.min_head_offset()?;

            let popped: Vec<Option<SkelFrame>> = self
                .queues
                .iter_mut()
                .map(|queue| {
                    let head = queue.front()?.frame_offset_ms();
                    if head - min_offset < tolerance {
                        queue.pop_front()
                    } else {
                        None
                    }
                })
                .collect();

            if popped.iter().all(Option::is_some) {
                self.rounds += 1;
                return Some(SyncedFrames {
                    frames: popped.into_iter().flatten().collect(),
                });
            }

            let dropped = popped.iter().filter(|f| f.is_some()).count();
            self.discarded += dropped;
            debug!(
                "Partial sync at {}ms: dropped {} of {} camera heads",
                min_offset,
                dropped,
                self.queues.len()
            );
        }
    }

    /// Replay one synchronized round through `handler`.
    ///
    /// Returns `false`, without calling the handler, once the session is
    /// exhausted.
    pub fn replay_session_frame<F>(&mut self, handler: F) -> bool
    where
        F: FnOnce(&SyncedFrames),
    {
        match self.next_round() {
            Some(round) => {
                handler(&round);
                true
            }
            None => false,
        }
    }

    // None when there are no cameras or any queue is empty.
    fn min_head_offset(&self) -> Option<u32> {
        let mut min: Option<u32> = None;
        for queue in &self.queues {
            let head = queue.front()?.frame_offset_ms();
            min = Some(min.map_or(head, |m| m.min(head)));
        }
        min
    }
}

impl Iterator for Synchronizer {
    type Item = SyncedFrames;

    fn next(&mut self) -> Option<SyncedFrames> {
        self.next_round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skelsync_data::{JointSet, LogWriter};
    use std::fs::File;

    fn log(camera_id: CameraId, offsets: &[u32]) -> Vec<SkelFrame> {
        offsets
            .iter()
            .map(|&offset| SkelFrame::new(camera_id, 1, offset, JointSet::untracked()))
            .collect()
    }

    fn offsets(round: &SyncedFrames) -> Vec<u32> {
        round.iter().map(SkelFrame::frame_offset_ms).collect()
    }

    #[test]
    fn test_two_cameras_three_rounds() {
        let mut sync = Synchronizer::from_logs(
            vec![log(0, &[0, 33, 66]), log(1, &[1, 32, 70])],
            FRAME_TIME_THRESHOLD_MS,
        );

        let rounds: Vec<Vec<u32>> = sync.by_ref().map(|r| offsets(&r)).collect();
        assert_eq!(rounds, vec![vec![0, 1], vec![33, 32], vec![66, 70]]);
        assert_eq!(sync.rounds(), 3);
        assert_eq!(sync.discarded(), 0);
    }

    #[test]
    fn test_truncated_camera_ends_session() {
        let mut sync = Synchronizer::from_logs(
            vec![log(0, &[0, 33, 66]), log(1, &[1, 32])],
            FRAME_TIME_THRESHOLD_MS,
        );

        let mut seen = Vec::new();
        assert!(sync.replay_session_frame(|r| seen.push(offsets(r))));
        assert!(sync.replay_session_frame(|r| seen.push(offsets(r))));
        assert!(!sync.replay_session_frame(|_| panic!("handler called after end of session")));
        assert_eq!(seen, vec![vec![0, 1], vec![33, 32]]);
        assert_eq!(sync.remaining(0), 1);
    }

    #[test]
    fn test_partial_pass_drops_early_frames() {
        // Camera 1 starts late: camera 0's early frames are popped alone and dropped.
        let mut sync = Synchronizer::from_logs(
            vec![log(0, &[0, 33, 66, 99]), log(1, &[60, 95])],
            FRAME_TIME_THRESHOLD_MS,
        );

        let round = sync.next_round().unwrap();
        assert_eq!(offsets(&round), vec![66, 60]);
        assert_eq!(sync.discarded(), 2);

        let round = sync.next_round().unwrap();
        assert_eq!(offsets(&round), vec![99, 95]);
        assert!(sync.next_round().is_none());
    }

    #[test]
    fn test_tolerance_is_strict_and_against_minimum() {
        let mut sync = Synchronizer::from_logs(
            vec![log(0, &[0, 40]), log(1, &[24, 41]), log(2, &[10, 45])],
            FRAME_TIME_THRESHOLD_MS,
        );

        // 24ms from the minimum is outside the window: cameras 0 and 2 are
        // popped and dropped, camera 1 keeps its head at 24.
        let round = sync.next_round().unwrap();
        assert_eq!(offsets(&round), vec![40, 24, 45]);
        assert_eq!(sync.discarded(), 2);
        assert_eq!(round.get(1).unwrap().camera_id(), 1);
        assert_eq!(round.reference().camera_id(), 0);
    }

    #[test]
    fn test_empty_camera_produces_nothing() {
        let mut sync = Synchronizer::from_logs(vec![log(0, &[0, 33]), Vec::new()], 24);
        assert!(sync.next_round().is_none());
        assert_eq!(sync.remaining(0), 2);
    }

    #[test]
    fn test_single_camera_replays_every_frame() {
        let sync = Synchronizer::from_logs(vec![log(0, &[0, 10, 20])], 24);
        assert_eq!(sync.count(), 3);
    }

    #[test]
    fn test_zero_tolerance_still_terminates() {
        let mut sync = Synchronizer::from_logs(vec![log(0, &[5, 6]), log(1, &[5, 7])], 0);
        assert_eq!(sync.tolerance_ms(), 1);
        assert_eq!(offsets(&sync.next_round().unwrap()), vec![5, 5]);
        assert!(sync.next_round().is_none());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session: SessionId = "12:00:00.000".parse().unwrap();
        for (camera, offsets) in [(0, [0u32, 33]), (1, [2, 35])] {
            let file = File::create(session.log_path(dir.path(), camera)).unwrap();
            let mut writer = LogWriter::new(file, camera).unwrap();
            for frame in log(camera, &offsets) {
                writer.write_frame(&frame).unwrap();
            }
            writer.into_inner().unwrap();
        }

        let mut sync = Synchronizer::load(dir.path(), session, 2, FRAME_TIME_THRESHOLD_MS).unwrap();
        assert_eq!(sync.num_cameras(), 2);
        assert_eq!(sync.total_remaining(), 4);
        assert_eq!(offsets(&sync.next_round().unwrap()), vec![0, 2]);
    }

    #[test]
    fn test_load_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session: SessionId = "12:00:00.000".parse().unwrap();
        let err = Synchronizer::load(dir.path(), session, 1, 24).unwrap_err();
        assert!(matches!(err, SyncError::Log { camera: 0, .. }));
    }

    #[test]
    fn test_load_header_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session: SessionId = "12:00:00.000".parse().unwrap();
        let file = File::create(session.log_path(dir.path(), 0)).unwrap();
        LogWriter::new(file, 3).unwrap().into_inner().unwrap();

        let err = Synchronizer::load(dir.path(), session, 1, 24).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Log {
                source: LogError::HeaderMismatch { expected: 0, found: 3 },
                ..
            }
        ));
    }

    #[test]
    fn test_load_requires_cameras() {
        let session: SessionId = "12:00:00.000".parse().unwrap();
        assert!(matches!(
            Synchronizer::load("/nonexistent", session, 0, 24),
            Err(SyncError::NoCameras)
        ));
    }
}
