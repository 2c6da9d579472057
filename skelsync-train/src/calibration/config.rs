//! Calibration hyperparameters

use crate::ingest::FRAME_TIME_THRESHOLD_MS;
use crate::nn::{NetworkConfig, TrainingMode, WeightInit};
use serde::{Deserialize, Serialize};
use skelsync_data::JOINT_VECTOR_LEN;

/// Settings shared by every camera-pair network of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub learning_rate: f32,
    pub momentum: f32,
    pub mode: TrainingMode,
    /// Synchronized rounds per weight update in batch mode.
    pub batch_size: usize,
    pub init: WeightInit,
    /// Replay synchronization window in milliseconds.
    pub tolerance_ms: u32,
    /// Skip rounds where any camera reports an untracked joint. The sentinel
    /// is far outside any real position and drives training to divergence.
    pub skip_untracked: bool,
    /// Rounds between progress log lines.
    pub progress_interval: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.15,
            momentum: 0.1,
            mode: TrainingMode::Online,
            batch_size: 32,
            init: WeightInit::default(),
            tolerance_ms: FRAME_TIME_THRESHOLD_MS,
            skip_untracked: true,
            progress_interval: 300,
        }
    }
}

impl CalibrationConfig {
    /// Network layout for one camera pair: joints in, joints out, and a
    /// hidden layer the square of the input size.
    pub fn network_config(&self) -> NetworkConfig {
        let input = JOINT_VECTOR_LEN;
        NetworkConfig::new(input, input * input, input)
            .with_learning_rate(self.learning_rate)
            .with_momentum(self.momentum)
            .with_mode(self.mode)
            .with_init(self.init)
    }
}
