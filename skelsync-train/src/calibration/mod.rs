//! Learned multi-camera calibration
//!
//! One network per non-reference camera learns to map that camera's joint
//! positions onto the reference camera's (camera 0) positions for the same
//! skeleton. Training data comes from replaying a recorded session; once
//! trained, [`Calibration::transform`] converts live joints into reference
//! coordinates.

mod config;
mod model;

pub use config::CalibrationConfig;
pub use model::CalibrationModel;

use crate::ingest::{SyncError, SyncedFrames, Synchronizer};
use crate::nn::{Network, NetworkError, TrainingMode};
use skelsync_data::{CameraId, JOINT_VECTOR_LEN, JointSet, SessionId, SkelFrame};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Camera whose coordinate space every other camera is mapped into.
pub const REFERENCE_CAMERA: CameraId = 0;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration needs at least one camera")]
    NoCameras,

    #[error("No recorded session to calibrate from")]
    NoSession,

    #[error("Unknown camera {0}")]
    UnknownCamera(CameraId),

    #[error("Network for camera {camera} failed: {source}")]
    Network {
        camera: CameraId,
        #[source]
        source: NetworkError,
    },

    #[error("Model network for camera {camera} maps {input} -> {output} values, expected {expected} -> {expected}")]
    ModelShape {
        camera: CameraId,
        input: usize,
        output: usize,
        expected: usize,
    },

    #[error("Replay error: {0}")]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Synchronized rounds used for training.
    pub rounds_trained: usize,
    /// Synchronized rounds skipped because of untracked joints.
    pub rounds_skipped: usize,
    /// Frames dropped by the synchronizer while aligning cameras.
    pub frames_discarded: usize,
    /// Mean training loss per non-reference camera, in camera order.
    pub mean_loss: Vec<(CameraId, f32)>,
}

/// Per-camera calibration networks and the session they train on.
pub struct Calibration {
    config: CalibrationConfig,
    num_cameras: usize,
    synchronizer: Option<Synchronizer>,
    networks: Vec<Network>,
}

impl Calibration {
    /// Load a recorded session from `log_dir` and build one untrained network
    /// per non-reference camera.
    pub fn new(
        log_dir: impl AsRef<Path>,
        session: SessionId,
        num_cameras: usize,
        config: &CalibrationConfig,
    ) -> Result<Self, CalibrationError> {
        let synchronizer = Synchronizer::load(log_dir, session, num_cameras, config.tolerance_ms)?;
        Self::with_synchronizer(synchronizer, config)
    }

    /// Calibrate against an already loaded session.
    pub fn with_synchronizer(
        synchronizer: Synchronizer,
        config: &CalibrationConfig,
    ) -> Result<Self, CalibrationError> {
        let num_cameras = synchronizer.num_cameras();
        if num_cameras == 0 {
            return Err(CalibrationError::NoCameras);
        }

        let network_config = config.network_config();
        let networks = (1..num_cameras)
            .map(|_| Network::new(network_config.clone()))
            .collect();

        info!(
            "Calibration set up for {} cameras ({}x{}x{} networks)",
            num_cameras,
            network_config.input_size,
            network_config.hidden_size,
            network_config.output_size
        );

        Ok(Self {
            config: config.clone(),
            num_cameras,
            synchronizer: Some(synchronizer),
            networks,
        })
    }

    /// Restore trained networks for transform-only use.
    pub fn from_model(model: CalibrationModel) -> Result<Self, CalibrationError> {
        let num_cameras = model.num_cameras();
        let mut networks = Vec::with_capacity(model.networks.len());
        for (camera, snapshot) in (1..).zip(model.networks) {
            let (input, output) = (snapshot.config.input_size, snapshot.config.output_size);
            if input != JOINT_VECTOR_LEN || output != JOINT_VECTOR_LEN {
                return Err(CalibrationError::ModelShape {
                    camera,
                    input,
                    output,
                    expected: JOINT_VECTOR_LEN,
                });
            }
            let network = Network::from_snapshot(snapshot)
                .map_err(|source| CalibrationError::Network { camera, source })?;
            networks.push(network);
        }

        Ok(Self {
            config: CalibrationConfig::default(),
            num_cameras,
            synchronizer: None,
            networks,
        })
    }

    pub fn num_cameras(&self) -> usize {
        self.num_cameras
    }

    /// Trained networks; index `i` serves camera `i + 1`.
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    /// Network mapping `camera_id` into reference space.
    pub fn network(&self, camera_id: CameraId) -> Option<&Network> {
        if camera_id <= REFERENCE_CAMERA {
            return None;
        }
        self.networks.get((camera_id - 1) as usize)
    }

    /// Replay the whole session, training every camera pair on each
    /// synchronized round until the session is exhausted.
    pub fn calibrate(&mut self) -> Result<CalibrationReport, CalibrationError> {
        let synchronizer = self.synchronizer.as_mut().ok_or(CalibrationError::NoSession)?;
        let networks = &mut self.networks;
        let config = &self.config;

        let mut loss_sums = vec![0.0f64; networks.len()];
        let mut rounds_trained = 0usize;
        let mut rounds_skipped = 0usize;

        info!("Calibration started");
        while let Some(round) = synchronizer.next_round() {
            if config.skip_untracked && !fully_tracked(&round) {
                rounds_skipped += 1;
                debug!("Skipping round at {}ms: untracked joints", round.reference().frame_offset_ms());
                continue;
            }

            let expected = round.reference().to_vec();
            for (index, network) in networks.iter_mut().enumerate() {
                let camera = (index + 1) as CameraId;
                let frame = round.get(camera).ok_or(CalibrationError::UnknownCamera(camera))?;
                let loss = network
                    .train(&frame.to_vec(), &expected)
                    .map_err(|source| CalibrationError::Network { camera, source })?;
                loss_sums[index] += f64::from(loss);
            }
            rounds_trained += 1;

            if config.mode == TrainingMode::Batch && rounds_trained % config.batch_size.max(1) == 0 {
                flush_all(networks)?;
            }
            if config.progress_interval > 0 && rounds_trained % config.progress_interval == 0 {
                info!("Calibration executing: {} rounds trained", rounds_trained);
            }
        }

        if config.mode == TrainingMode::Batch {
            flush_all(networks)?;
        }

        let mean_loss = loss_sums
            .iter()
            .enumerate()
            .map(|(index, sum)| {
                let mean = if rounds_trained == 0 { 0.0 } else { sum / rounds_trained as f64 };
                ((index + 1) as CameraId, mean as f32)
            })
            .collect();

        let report = CalibrationReport {
            rounds_trained,
            rounds_skipped,
            frames_discarded: synchronizer.discarded(),
            mean_loss,
        };
        info!(
            "Calibration finished: {} rounds trained, {} skipped, {} frames discarded",
            report.rounds_trained, report.rounds_skipped, report.frames_discarded
        );
        Ok(report)
    }

    /// Map a camera's joints into reference coordinates.
    ///
    /// Output joint `k` is read from network outputs `3k..3k+3`. The reference
    /// camera maps to itself.
    pub fn transform(
        &self,
        camera_id: CameraId,
        skeleton_id: i32,
        joints: &JointSet,
    ) -> Result<SkelFrame, CalibrationError> {
        if camera_id == REFERENCE_CAMERA && self.num_cameras > 0 {
            return Ok(SkelFrame::new(camera_id, skeleton_id, 0, *joints));
        }

        let output = self.transform_vector(camera_id, &joints.to_vec())?;
        let transformed = JointSet::from_slice(&output).ok_or(CalibrationError::ModelShape {
            camera: camera_id,
            input: JOINT_VECTOR_LEN,
            output: output.len(),
            expected: JOINT_VECTOR_LEN,
        })?;
        Ok(SkelFrame::new(camera_id, skeleton_id, 0, transformed))
    }

    /// Run a flattened joint vector through a camera's network.
    pub fn transform_vector(&self, camera_id: CameraId, input: &[f32]) -> Result<Vec<f32>, CalibrationError> {
        let network = self
            .network(camera_id)
            .ok_or(CalibrationError::UnknownCamera(camera_id))?;
        network
            .feed_forward(input)
            .map_err(|source| CalibrationError::Network {
                camera: camera_id,
                source,
            })
    }

    /// Snapshot of every trained network.
    pub fn model(&self) -> CalibrationModel {
        CalibrationModel {
            networks: self.networks.iter().map(Network::snapshot).collect(),
        }
    }

    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        Ok(self.model().save(path)?)
    }

    pub fn load_model(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        Self::from_model(CalibrationModel::load(path)?)
    }
}

fn fully_tracked(round: &SyncedFrames) -> bool {
    round.iter().all(|frame| frame.joints().is_fully_tracked())
}

fn flush_all(networks: &mut [Network]) -> Result<(), CalibrationError> {
    for (index, network) in networks.iter_mut().enumerate() {
        network.flush_batch().map_err(|source| CalibrationError::Network {
            camera: (index + 1) as CameraId,
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::NetworkConfig;
    use glam::Vec3;
    use skelsync_data::{JOINT_COUNT, JointType};

    fn joints(shift: f32, t: f32) -> JointSet {
        let mut positions = [Vec3::ZERO; JOINT_COUNT];
        for (i, p) in positions.iter_mut().enumerate() {
            *p = Vec3::new(0.01 * i as f32 + shift, 0.5 + 0.1 * t, 0.2 + shift);
        }
        JointSet::from_positions(positions)
    }

    fn session(num_cameras: usize, rounds: usize) -> Synchronizer {
        let logs = (0..num_cameras)
            .map(|camera| {
                (0..rounds)
                    .map(|r| {
                        let offset = r as u32 * 33 + camera as u32;
                        SkelFrame::new(camera as CameraId, 1, offset, joints(camera as f32 * 0.1, r as f32))
                    })
                    .collect()
            })
            .collect();
        Synchronizer::from_logs(logs, 24)
    }

    fn small_model(num_cameras: usize) -> CalibrationModel {
        let config = NetworkConfig::new(JOINT_VECTOR_LEN, 6, JOINT_VECTOR_LEN);
        CalibrationModel {
            networks: (1..num_cameras).map(|_| Network::new(config.clone()).snapshot()).collect(),
        }
    }

    #[test]
    fn test_one_network_per_non_reference_camera() {
        let calibration = Calibration::with_synchronizer(session(3, 0), &CalibrationConfig::default()).unwrap();
        assert_eq!(calibration.num_cameras(), 3);
        assert!(calibration.network(0).is_none());
        assert!(calibration.network(3).is_none());

        let network = calibration.network(2).unwrap();
        assert_eq!(network.hidden_weights().shape(), (3600, 61));
        assert_eq!(network.output_weights().shape(), (60, 3601));
    }

    #[test]
    fn test_calibrate_trains_every_round() {
        let config = CalibrationConfig::default();
        let mut calibration = Calibration::with_synchronizer(session(2, 3), &config).unwrap();
        let untrained = Network::new(config.network_config());

        let report = calibration.calibrate().unwrap();
        assert_eq!(report.rounds_trained, 3);
        assert_eq!(report.rounds_skipped, 0);
        assert_eq!(report.mean_loss.len(), 1);
        assert_eq!(report.mean_loss[0].0, 1);
        assert!(report.mean_loss[0].1.is_finite());
        assert_ne!(calibration.network(1).unwrap().output_weights(), untrained.output_weights());

        // The session is drained; a second run has nothing to train on.
        assert_eq!(calibration.calibrate().unwrap().rounds_trained, 0);
    }

    #[test]
    fn test_batch_mode_flushes_remaining_rounds() {
        let config = CalibrationConfig {
            mode: TrainingMode::Batch,
            batch_size: 2,
            ..CalibrationConfig::default()
        };
        let mut calibration = Calibration::with_synchronizer(session(2, 3), &config).unwrap();
        let report = calibration.calibrate().unwrap();
        assert_eq!(report.rounds_trained, 3);
        assert_eq!(calibration.network(1).unwrap().pending_batch_samples(), 0);
    }

    #[test]
    fn test_skip_untracked_rounds() {
        let mut logs: Vec<Vec<SkelFrame>> = session(2, 2).map(|round| round.into_vec()).fold(
            vec![Vec::new(), Vec::new()],
            |mut logs, frames| {
                for (log, frame) in logs.iter_mut().zip(frames) {
                    log.push(frame);
                }
                logs
            },
        );
        let mut partial = *logs[1][0].joints();
        partial.clear(JointType::HandLeft);
        logs[1][0] = SkelFrame::new(1, 1, logs[1][0].frame_offset_ms(), partial);

        let mut calibration =
            Calibration::with_synchronizer(Synchronizer::from_logs(logs, 24), &CalibrationConfig::default())
                .unwrap();
        let report = calibration.calibrate().unwrap();
        assert_eq!(report.rounds_skipped, 1);
        assert_eq!(report.rounds_trained, 1);
    }

    #[test]
    fn test_transform_repacks_three_values_per_joint() {
        let calibration = Calibration::from_model(small_model(2)).unwrap();
        let input = joints(0.3, 1.0);

        let raw = calibration.network(1).unwrap().feed_forward(&input.to_vec()).unwrap();
        let frame = calibration.transform(1, 42, &input).unwrap();

        assert_eq!(frame.camera_id(), 1);
        assert_eq!(frame.skeleton_id(), 42);
        for joint in JointType::ALL {
            let k = joint.index();
            assert_eq!(frame.joints().get(joint), Vec3::new(raw[3 * k], raw[3 * k + 1], raw[3 * k + 2]));
        }
    }

    #[test]
    fn test_transform_reference_and_unknown_cameras() {
        let calibration = Calibration::from_model(small_model(2)).unwrap();
        let input = joints(0.0, 0.0);

        let same = calibration.transform(REFERENCE_CAMERA, 5, &input).unwrap();
        assert_eq!(same.joints(), &input);

        assert!(matches!(
            calibration.transform(2, 5, &input),
            Err(CalibrationError::UnknownCamera(2))
        ));
        assert!(matches!(
            calibration.transform(-1, 5, &input),
            Err(CalibrationError::UnknownCamera(-1))
        ));
    }

    #[test]
    fn test_transform_vector_size_checked() {
        let calibration = Calibration::from_model(small_model(2)).unwrap();
        assert!(matches!(
            calibration.transform_vector(1, &[0.0; 3]),
            Err(CalibrationError::Network {
                camera: 1,
                source: NetworkError::InputSize { expected: 60, found: 3 }
            })
        ));
    }

    #[test]
    fn test_diverged_network_surfaces_on_transform() {
        let mut model = small_model(2);
        model.networks[0].hidden_weights[(0, 0)] = f32::INFINITY;
        model.networks[0].output_weights[(0, 0)] = f32::NAN;
        let calibration = Calibration::from_model(model).unwrap();

        assert!(matches!(
            calibration.transform(1, 0, &joints(0.0, 0.0)),
            Err(CalibrationError::Network {
                source: NetworkError::NumericDivergence,
                ..
            })
        ));
    }

    #[test]
    fn test_model_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let calibration = Calibration::from_model(small_model(3)).unwrap();
        calibration.save_model(&path).unwrap();

        let restored = Calibration::load_model(&path).unwrap();
        assert_eq!(restored.num_cameras(), 3);
        let input = joints(0.2, 0.5);
        assert_eq!(
            restored.transform(2, 1, &input).unwrap(),
            calibration.transform(2, 1, &input).unwrap()
        );
    }

    #[test]
    fn test_model_shape_checked() {
        let config = NetworkConfig::new(3, 4, 3);
        let model = CalibrationModel {
            networks: vec![Network::new(config).snapshot()],
        };
        assert!(matches!(
            Calibration::from_model(model),
            Err(CalibrationError::ModelShape { camera: 1, input: 3, .. })
        ));
    }

    #[test]
    fn test_calibrate_without_session_fails() {
        let mut calibration = Calibration::from_model(small_model(2)).unwrap();
        assert!(matches!(calibration.calibrate(), Err(CalibrationError::NoSession)));
    }
}
