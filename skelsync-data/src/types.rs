//! Core skeleton data types.
//!
//! These are CPU-side snapshots shared by the recorder, the log codec, the
//! replay synchronizer and the calibration networks.

use glam::Vec3;
use std::fmt;

/// Number of joints tracked per skeleton by the depth-sensor platform.
pub const JOINT_COUNT: usize = 20;

/// Number of floats in a flattened [`JointSet`] (x, y, z per joint).
pub const JOINT_VECTOR_LEN: usize = JOINT_COUNT * 3;

/// Position value written on every axis of a joint the sensor did not track.
///
/// It is a legal float, so a joint genuinely tracked at `f32::MIN` is
/// indistinguishable from an untracked one.
pub const UNTRACKED_POSITION: f32 = f32::MIN;

/// Camera identifier. Camera 0 is the calibration reference.
pub type CameraId = i32;

/// Skeletal joints in platform order; the discriminant is the wire index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JointType {
    HipCenter = 0,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    /// All joints, ordered by wire index.
    pub const ALL: [JointType; JOINT_COUNT] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];

    /// Wire index of this joint.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a joint by wire index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Fixed-size set of joint positions, indexed by [`JointType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSet {
    positions: [Vec3; JOINT_COUNT],
}

impl JointSet {
    /// A joint set with every joint marked untracked.
    pub fn untracked() -> Self {
        Self {
            positions: [Vec3::splat(UNTRACKED_POSITION); JOINT_COUNT],
        }
    }

    /// Build a joint set from positions in joint order.
    pub fn from_positions(positions: [Vec3; JOINT_COUNT]) -> Self {
        Self { positions }
    }

    /// Rebuild a joint set from a flattened `[x0, y0, z0, x1, ...]` slice.
    ///
    /// Returns `None` unless the slice holds exactly [`JOINT_VECTOR_LEN`] floats.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        if values.len() != JOINT_VECTOR_LEN {
            return None;
        }
        let mut positions = [Vec3::ZERO; JOINT_COUNT];
        for (position, xyz) in positions.iter_mut().zip(values.chunks_exact(3)) {
            *position = Vec3::from_slice(xyz);
        }
        Some(Self { positions })
    }

    /// Position of a single joint.
    pub fn get(&self, joint: JointType) -> Vec3 {
        self.positions[joint.index()]
    }

    /// Overwrite the position of a single joint.
    pub fn set(&mut self, joint: JointType, position: Vec3) {
        self.positions[joint.index()] = position;
    }

    /// Mark a joint untracked.
    pub fn clear(&mut self, joint: JointType) {
        self.set(joint, Vec3::splat(UNTRACKED_POSITION));
    }

    pub fn is_tracked(&self, joint: JointType) -> bool {
        !is_untracked(self.get(joint))
    }

    /// True when no joint carries the untracked sentinel.
    pub fn is_fully_tracked(&self) -> bool {
        self.positions.iter().all(|p| !is_untracked(*p))
    }

    pub fn positions(&self) -> &[Vec3; JOINT_COUNT] {
        &self.positions
    }

    /// Flatten row-major, three floats per joint.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(JOINT_VECTOR_LEN);
        for p in &self.positions {
            out.extend_from_slice(&p.to_array());
        }
        out
    }
}

impl Default for JointSet {
    fn default() -> Self {
        Self::untracked()
    }
}

fn is_untracked(p: Vec3) -> bool {
    p.x == UNTRACKED_POSITION && p.y == UNTRACKED_POSITION && p.z == UNTRACKED_POSITION
}

/// One skeleton as seen by one camera at one instant.
///
/// Built by live capture or by log parsing, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SkelFrame {
    camera_id: CameraId,
    skeleton_id: i32,
    frame_offset_ms: u32,
    joints: JointSet,
}

impl SkelFrame {
    pub fn new(camera_id: CameraId, skeleton_id: i32, frame_offset_ms: u32, joints: JointSet) -> Self {
        Self {
            camera_id,
            skeleton_id,
            frame_offset_ms,
            joints,
        }
    }

    /// Camera that tracked this skeleton.
    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Tracking id assigned by the camera. Different cameras may assign
    /// different ids to the same physical skeleton.
    pub fn skeleton_id(&self) -> i32 {
        self.skeleton_id
    }

    /// Milliseconds since the recording session started.
    pub fn frame_offset_ms(&self) -> u32 {
        self.frame_offset_ms
    }

    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    /// Flattened joint positions for network input/output.
    pub fn to_vec(&self) -> Vec<f32> {
        self.joints.to_vec()
    }
}
