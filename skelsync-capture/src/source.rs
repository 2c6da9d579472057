//! Skeleton snapshots as delivered by a tracking camera, and the sink they
//! are pushed into.

use chrono::{DateTime, Local};
use glam::Vec3;
use skelsync_data::{CameraId, JointType};

/// Whole-skeleton tracking quality reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    /// Only the skeleton centre is known; joints are meaningless.
    PositionOnly,
    Tracked,
}

/// Per-joint tracking quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JointTrackingState {
    #[default]
    NotTracked,
    /// Estimated by the sensor from neighbouring joints.
    Inferred,
    Tracked,
}

impl JointTrackingState {
    /// Whether the joint's position is worth recording.
    pub fn has_position(self) -> bool {
        matches!(self, JointTrackingState::Inferred | JointTrackingState::Tracked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedJoint {
    pub joint_type: JointType,
    pub position: Vec3,
    pub state: JointTrackingState,
}

impl TrackedJoint {
    pub fn new(joint_type: JointType, position: Vec3, state: JointTrackingState) -> Self {
        Self {
            joint_type,
            position,
            state,
        }
    }
}

/// One skeleton from one sensor frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkeletonSnapshot {
    pub tracking_id: i32,
    pub state: SkeletonTrackingState,
    pub joints: Vec<TrackedJoint>,
}

impl SkeletonSnapshot {
    pub fn new(tracking_id: i32, state: SkeletonTrackingState) -> Self {
        Self {
            tracking_id,
            state,
            joints: Vec::new(),
        }
    }

    /// Add a joint reading.
    pub fn with_joint(mut self, joint_type: JointType, position: Vec3, state: JointTrackingState) -> Self {
        self.joints.push(TrackedJoint::new(joint_type, position, state));
        self
    }

    /// A fully tracked skeleton from positions in joint order.
    pub fn tracked(tracking_id: i32, positions: &[Vec3]) -> Self {
        let joints = JointType::ALL
            .iter()
            .zip(positions)
            .map(|(&joint_type, &position)| TrackedJoint::new(joint_type, position, JointTrackingState::Tracked))
            .collect();
        Self {
            tracking_id,
            state: SkeletonTrackingState::Tracked,
            joints,
        }
    }
}

/// Receives skeletons as cameras capture them.
///
/// Implementors decide what to keep; returns whether the skeleton was stored.
pub trait FrameSink {
    type Error: std::error::Error;

    fn on_frame_captured(
        &mut self,
        camera_id: CameraId,
        skeleton: &SkeletonSnapshot,
        timestamp: DateTime<Local>,
    ) -> Result<bool, Self::Error>;
}
