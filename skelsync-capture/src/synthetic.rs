//! Synthetic multi-camera skeleton source for demos and tests.

use crate::source::{FrameSink, JointTrackingState, SkeletonSnapshot, SkeletonTrackingState};
use chrono::{DateTime, Duration, Local};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skelsync_data::{CameraId, JOINT_COUNT, JointType};
use tracing::info;

/// Nominal sensor frame interval (30 fps).
pub const FRAME_INTERVAL_MS: u32 = 33;

/// Every this many frames one joint drops out of tracking.
pub const UNTRACKED_EVERY: usize = 17;

const CAMERA_SPACING: f32 = 0.1;
const STRIDE: f32 = 0.02;
const MAX_JITTER_MS: u32 = 4;

// Standing pose relative to the hip centre, in platform joint order.
const POSE: [[f32; 3]; JOINT_COUNT] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.2, 0.0],
    [0.0, 0.45, 0.0],
    [0.0, 0.62, 0.0],
    [-0.18, 0.42, 0.0],
    [-0.26, 0.18, 0.0],
    [-0.3, -0.05, 0.0],
    [-0.31, -0.12, 0.0],
    [0.18, 0.42, 0.0],
    [0.26, 0.18, 0.0],
    [0.3, -0.05, 0.0],
    [0.31, -0.12, 0.0],
    [-0.1, -0.05, 0.0],
    [-0.11, -0.48, 0.0],
    [-0.12, -0.88, 0.0],
    [-0.12, -0.95, 0.08],
    [0.1, -0.05, 0.0],
    [0.11, -0.48, 0.0],
    [0.12, -0.88, 0.0],
    [0.12, -0.95, 0.08],
];

/// One camera's view of a synthetic frame.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub camera_id: CameraId,
    pub offset_ms: u32,
    pub skeleton: SkeletonSnapshot,
}

/// A single skeleton walking along the x axis, seen by several cameras.
///
/// Camera `i` sees the walker shifted by `i * 0.1` m and reports it under
/// tracking id `i + 1`, with a few milliseconds of clock jitter per frame.
pub struct SyntheticWalker {
    num_cameras: usize,
    rng: StdRng,
    step: usize,
}

impl SyntheticWalker {
    pub fn new(num_cameras: usize, seed: u64) -> Self {
        Self {
            num_cameras,
            rng: StdRng::seed_from_u64(seed),
            step: 0,
        }
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    /// The next frame for every camera.
    pub fn next_step(&mut self) -> Vec<SyntheticFrame> {
        let step = self.step;
        self.step += 1;

        let hip = Vec3::new(STRIDE * step as f32, 1.0, 2.5);
        let dropped = (step % UNTRACKED_EVERY == UNTRACKED_EVERY - 1).then(|| JointType::ALL[step % JOINT_COUNT]);

        (0..self.num_cameras)
            .map(|camera| {
                let shift = Vec3::new(CAMERA_SPACING * camera as f32, 0.0, 0.0);
                let mut skeleton = SkeletonSnapshot::new(camera as i32 + 1, SkeletonTrackingState::Tracked);
                for (joint, offset) in JointType::ALL.into_iter().zip(POSE) {
                    let state = if dropped == Some(joint) {
                        JointTrackingState::NotTracked
                    } else {
                        JointTrackingState::Tracked
                    };
                    skeleton = skeleton.with_joint(joint, hip + shift + Vec3::from_array(offset), state);
                }

                let jitter = self.rng.random_range(0..MAX_JITTER_MS);
                SyntheticFrame {
                    camera_id: camera as CameraId,
                    offset_ms: step as u32 * FRAME_INTERVAL_MS + camera as u32 + jitter,
                    skeleton,
                }
            })
            .collect()
    }

    /// Push `frames` steps into `sink`, timestamped from `started_at`.
    ///
    /// Returns the number of skeletons the sink stored.
    pub fn record<S: FrameSink>(
        &mut self,
        sink: &mut S,
        started_at: DateTime<Local>,
        frames: usize,
    ) -> Result<usize, S::Error> {
        let mut stored = 0;
        for _ in 0..frames {
            for frame in self.next_step() {
                let timestamp = started_at + Duration::milliseconds(i64::from(frame.offset_ms));
                if sink.on_frame_captured(frame.camera_id, &frame.skeleton, timestamp)? {
                    stored += 1;
                }
            }
        }
        info!("Generated {} synthetic frames for {} cameras", frames, self.num_cameras);
        Ok(stored)
    }
}
