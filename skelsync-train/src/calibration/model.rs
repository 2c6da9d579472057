//! Persisted calibration results

use crate::nn::NetworkSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Trained networks of a calibration run.
///
/// `networks[i]` maps camera `i + 1` into the reference camera's space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub networks: Vec<NetworkSnapshot>,
}

impl CalibrationModel {
    /// Number of cameras covered, including the reference.
    pub fn num_cameras(&self) -> usize {
        self.networks.len() + 1
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!("Saved calibration model to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let model: Self = serde_json::from_reader(reader)?;
        info!(
            "Loaded calibration model for {} cameras from {}",
            model.num_cameras(),
            path.as_ref().display()
        );
        Ok(model)
    }
}
